//! Topical domains: curated subject areas with keywords and a derived
//! vector collection per environment.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::load_with_overlay;
use crate::env::Env;
use crate::error::{RegistryError, Result};

fn default_active() -> bool {
    true
}

fn default_collection_prefix() -> String {
    "news".to_string()
}

/// Result caps per environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxResults {
    pub dev: usize,
    pub prod: usize,
}

impl Default for MaxResults {
    fn default() -> Self {
        Self { dev: 10, prod: 50 }
    }
}

/// A curated subject area. Declared in `domains.json`, immutable at
/// runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    /// Stable identifier, set from the config key at load time.
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Ordered, case-insensitive keywords used for relevance filtering.
    pub keywords: Vec<String>,

    #[serde(default)]
    pub max_results: MaxResults,

    #[serde(default = "default_collection_prefix")]
    pub vector_collection_prefix: String,
}

impl Domain {
    /// Name of the vector collection holding this domain's articles in
    /// the given environment, e.g. `news_football_dev`.
    pub fn collection_name(&self, env: Env) -> String {
        format!("{}_{}_{}", self.vector_collection_prefix, self.id, env)
    }

    pub fn max_results(&self, env: Env) -> usize {
        match env {
            Env::Dev => self.max_results.dev,
            Env::Prod => self.max_results.prod,
        }
    }

    /// Keywords lowercased, preserving declaration order.
    pub fn keywords_lower(&self) -> Vec<String> {
        self.keywords.iter().map(|k| k.to_lowercase()).collect()
    }
}

#[derive(Debug, Deserialize)]
struct DomainsFile {
    domains: IndexMap<String, Domain>,
}

/// Authoritative list of topical domains.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    domains: IndexMap<String, Domain>,
}

impl DomainRegistry {
    /// Load `domains.json` (plus env overlay) from the config directory.
    pub fn load(dir: &Path, env: Env) -> Result<Self> {
        let file: DomainsFile = load_with_overlay(dir, "domains", env)?;
        Ok(Self::from_domains(file.domains))
    }

    pub fn from_domains(mut domains: IndexMap<String, Domain>) -> Self {
        for (id, domain) in domains.iter_mut() {
            domain.id = id.clone();
        }
        let active = domains.values().filter(|d| d.active).count();
        tracing::info!(
            total = domains.len(),
            active = active,
            "Loaded domain registry"
        );
        Self { domains }
    }

    pub fn get(&self, id: &str) -> Option<&Domain> {
        self.domains.get(id)
    }

    /// Resolve a domain that must exist and be active; the error names
    /// which condition failed.
    pub fn require_active(&self, id: &str) -> Result<&Domain> {
        let domain = self
            .domains
            .get(id)
            .ok_or_else(|| RegistryError::UnknownDomain(id.to_string()))?;
        if !domain.active {
            return Err(RegistryError::InactiveDomain(id.to_string()));
        }
        Ok(domain)
    }

    pub fn active(&self) -> impl Iterator<Item = &Domain> {
        self.domains.values().filter(|d| d.active)
    }

    pub fn all(&self) -> impl Iterator<Item = &Domain> {
        self.domains.values()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
