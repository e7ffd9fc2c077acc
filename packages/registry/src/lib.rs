//! Topical domain and news-site registries.
//!
//! Both registries are loaded once at process start from JSON files
//! (with an optional per-environment overlay) and are immutable at
//! runtime. Every other package resolves domains and sites through
//! them; a site whose domain is missing or inactive is never crawled.

pub mod config;
pub mod domain;
pub mod env;
pub mod error;
pub mod site;

pub use config::load_with_overlay;
pub use domain::{Domain, DomainRegistry};
pub use env::Env;
pub use error::RegistryError;
pub use site::{DiscoveryPage, SiteConfig, SiteRegistry};
