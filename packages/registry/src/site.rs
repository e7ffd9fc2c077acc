//! News-site configuration: base URL, owning domain, discovery entry
//! pages and crawl hints.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::load_with_overlay;
use crate::env::Env;
use crate::error::{RegistryError, Result};

fn default_active() -> bool {
    true
}

fn default_max_links() -> usize {
    25
}

fn default_priority() -> i32 {
    5
}

/// A discovery entry page under a site (category/section index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPage {
    pub url: String,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Cap on links taken from this page per discovery pass.
    #[serde(default = "default_max_links")]
    pub max_links: usize,
}

/// Per-site configuration, refreshed into the link store on each pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Stable identifier, set from the config key at load time.
    #[serde(default)]
    pub id: String,

    pub name: String,

    pub base_url: String,

    /// Owning topical domain. Must exist and be active or the site is
    /// skipped.
    pub domain: String,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub discovery_pages: IndexMap<String, DiscoveryPage>,

    /// RSS/Atom feed URLs; well-known paths are probed when empty.
    #[serde(default)]
    pub feeds: Vec<String>,

    #[serde(default = "default_priority")]
    pub priority: i32,

    /// BCP 47 language hint used for the Accept-Language header.
    #[serde(default)]
    pub language: Option<String>,
}

impl SiteConfig {
    pub fn active_discovery_pages(&self) -> impl Iterator<Item = &DiscoveryPage> {
        self.discovery_pages.values().filter(|p| p.active)
    }
}

#[derive(Debug, Deserialize)]
struct SitesFile {
    sites: IndexMap<String, SiteConfig>,

    #[serde(default)]
    domain_mapping: IndexMap<String, Vec<String>>,
}

/// Registry of configured news sites, ordered by declaration.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: IndexMap<String, SiteConfig>,
    domain_mapping: IndexMap<String, Vec<String>>,
}

impl SiteRegistry {
    /// Load `sites.json` (plus env overlay) from the config directory.
    pub fn load(dir: &Path, env: Env) -> Result<Self> {
        let file: SitesFile = load_with_overlay(dir, "sites", env)?;
        Ok(Self::from_parts(file.sites, file.domain_mapping))
    }

    pub fn from_parts(
        mut sites: IndexMap<String, SiteConfig>,
        domain_mapping: IndexMap<String, Vec<String>>,
    ) -> Self {
        for (id, site) in sites.iter_mut() {
            site.id = id.clone();
        }
        tracing::info!(total = sites.len(), "Loaded site registry");
        Self {
            sites,
            domain_mapping,
        }
    }

    pub fn get(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&SiteConfig> {
        self.sites
            .get(id)
            .ok_or_else(|| RegistryError::UnknownSite(id.to_string()))
    }

    pub fn active(&self) -> impl Iterator<Item = &SiteConfig> {
        self.sites.values().filter(|s| s.active)
    }

    /// Active sites assigned to a domain. The explicit `domain_mapping`
    /// wins when present; otherwise sites are matched on their own
    /// `domain` field.
    pub fn active_for_domain(&self, domain: &str) -> Vec<&SiteConfig> {
        match self.domain_mapping.get(domain) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.sites.get(id))
                .filter(|s| s.active)
                .collect(),
            None => self
                .sites
                .values()
                .filter(|s| s.active && s.domain == domain)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> SiteRegistry {
        let raw = r#"{
            "sites": {
                "gazzetta": {
                    "name": "Gazzetta",
                    "base_url": "https://example.gazzetta.test",
                    "domain": "football",
                    "active": true,
                    "language": "it",
                    "discovery_pages": {
                        "serie-a": {"url": "https://example.gazzetta.test/serie-a", "max_links": 10},
                        "old": {"url": "https://example.gazzetta.test/old", "active": false}
                    }
                },
                "corriere": {
                    "name": "Corriere",
                    "base_url": "https://example.corriere.test",
                    "domain": "football",
                    "active": false
                },
                "techblog": {
                    "name": "Tech Blog",
                    "base_url": "https://example.techblog.test",
                    "domain": "tech"
                }
            },
            "domain_mapping": {
                "football": ["gazzetta", "corriere"]
            }
        }"#;
        let file: SitesFile = serde_json::from_str(raw).unwrap();
        SiteRegistry::from_parts(file.sites, file.domain_mapping)
    }

    #[test]
    fn ids_are_assigned_from_config_keys() {
        let registry = sample_registry();
        assert_eq!(registry.get("gazzetta").unwrap().id, "gazzetta");
    }

    #[test]
    fn mapping_filters_inactive_sites() {
        let registry = sample_registry();
        let sites = registry.active_for_domain("football");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].id, "gazzetta");
    }

    #[test]
    fn unmapped_domain_falls_back_to_site_field() {
        let registry = sample_registry();
        let sites = registry.active_for_domain("tech");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].id, "techblog");
    }

    #[test]
    fn inactive_discovery_pages_are_skipped() {
        let registry = sample_registry();
        let site = registry.get("gazzetta").unwrap();
        let pages: Vec<_> = site.active_discovery_pages().collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].max_links, 10);
    }

    #[test]
    fn require_reports_unknown_site() {
        let registry = sample_registry();
        assert!(matches!(
            registry.require("nope"),
            Err(RegistryError::UnknownSite(_))
        ));
    }
}
