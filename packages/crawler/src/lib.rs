//! Polite acquisition of news articles: per-host pacing with robots.txt
//! enforcement, candidate-URL discovery, and main-text extraction with a
//! quality gate.
//!
//! The crate is network-facing but storage-free: it turns site
//! configurations into candidate URLs and candidate URLs into validated
//! [`extract::ExtractedContent`] records. Persistence belongs to the
//! `store` crate.

pub mod config;
pub mod discover;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod hash;
pub mod pacer;

pub use config::{CrawlerConfig, HostPolicy, SpiderConfig};
pub use discover::{Candidate, DiscoveryStrategy, LinkDiscoverer, SiteDiscoverer};
pub use error::{CrawlError, CrawlResult, FailureReason};
pub use extract::{ArticleExtractor, ContentExtractor, ExtractedContent, ExtractionContext};
pub use fetch::{FetchedPage, HttpFetcher};
pub use pacer::{FetchOutcome, HostPacer};
