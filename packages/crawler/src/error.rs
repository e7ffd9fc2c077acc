//! Typed errors for the acquisition pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Every error maps
//! to a [`FailureReason`], the classification persisted on crawl
//! attempts and used to decide whether a failure counts toward a link's
//! BLOCKED promotion.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching, discovering or extracting.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// robots.txt forbids the URL for this crawler identity
    #[error("robots.txt disallows: {url}")]
    RobotsDisallowed { url: String },

    /// The host's back-off or Retry-After window is active
    #[error("rate limit window active for {host} (retry after {retry_after:?})")]
    RateLimited { host: String, retry_after: Duration },

    /// HTTP transport failure (DNS, connect, reset, decode)
    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status code
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Request exceeded the configured timeout
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// URL could not be parsed or has no host
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// HTTP client construction failed at startup
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Main-text extractor produced nothing usable
    #[error("no main content extracted from {url}")]
    NoContent { url: String },

    /// Body shorter than the minimum content size
    #[error("content too short ({length} chars) for {url}")]
    ContentTooShort { url: String, length: usize },

    /// Title missing or shorter than the minimum
    #[error("title too short ({length} chars) for {url}")]
    TitleTooShort { url: String, length: usize },

    /// None of the domain's keywords appear in title or body
    #[error("no {domain} keywords matched in {url}")]
    OffTopic { url: String, domain: String },

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl CrawlError {
    /// Classification recorded on the crawl attempt.
    pub fn reason(&self) -> FailureReason {
        match self {
            CrawlError::RobotsDisallowed { .. } | CrawlError::RateLimited { .. } => {
                FailureReason::Politeness
            }
            CrawlError::Http { .. }
            | CrawlError::Status { .. }
            | CrawlError::Timeout { .. }
            | CrawlError::InvalidUrl { .. }
            | CrawlError::ClientBuild(_)
            | CrawlError::Cancelled => FailureReason::Transport,
            CrawlError::NoContent { .. }
            | CrawlError::ContentTooShort { .. }
            | CrawlError::TitleTooShort { .. } => FailureReason::LowQuality,
            CrawlError::OffTopic { .. } => FailureReason::OffTopic,
        }
    }
}

/// Why a link failed. The string form is stored on the link's attempt
/// history; the variants past `OffTopic` are produced by the store
/// coordinator rather than by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// robots.txt denial or active rate-limit window; re-triable
    Politeness,
    /// timeout, DNS, reset, non-200
    Transport,
    /// extraction produced nothing, or output failed validation
    LowQuality,
    /// domain keywords absent from content
    OffTopic,
    /// content hash collides with an existing live link
    Duplicate,
    /// vector or relational write failed
    StoreWrite,
    /// dual write left the stores disagreeing; reconciler owns repair
    Inconsistent,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Politeness => "politeness",
            FailureReason::Transport => "transport",
            FailureReason::LowQuality => "low-quality",
            FailureReason::OffTopic => "off-topic",
            FailureReason::Duplicate => "duplicate",
            FailureReason::StoreWrite => "store-write",
            FailureReason::Inconsistent => "inconsistent",
        }
    }

    /// Whether this failure increments the link's `error_count` (and so
    /// can promote it to BLOCKED). Politeness denials are re-triable
    /// after the window; off-topic and duplicate links will not improve
    /// with retries, so counting them would only churn the sweep.
    pub fn counts_against_link(&self) -> bool {
        matches!(
            self,
            FailureReason::Transport
                | FailureReason::LowQuality
                | FailureReason::StoreWrite
                | FailureReason::Inconsistent
        )
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for crawl operations.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;
