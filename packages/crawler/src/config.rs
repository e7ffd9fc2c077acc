//! Crawler tuning, loaded from `crawler.json` with the usual env
//! overlay.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_max_failures() -> i32 {
    3
}

fn default_user_agent() -> String {
    "EdicolaBot/1.0 (+https://github.com/edicola/edicola)".to_string()
}

fn default_robots_ttl_hours() -> u64 {
    24
}

fn default_robots_error_ttl_hours() -> u64 {
    1
}

fn default_max_per_site() -> usize {
    25
}

fn default_max_concurrent_extractions() -> usize {
    5
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_discovery_order() -> Vec<String> {
    ["spider", "sitemap", "feeds", "category-pages", "homepage"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Per-host pacing policy. The defaults match a cautious crawler: one
/// request every two seconds, two in flight at most.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostPolicy {
    pub requests_per_second: f64,
    pub max_concurrent: usize,
    pub back_off_factor: f64,
    pub max_back_off_secs: u64,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            requests_per_second: 0.5,
            max_concurrent: 2,
            back_off_factor: 2.0,
            max_back_off_secs: 300,
        }
    }
}

impl HostPolicy {
    /// Minimum delay between successive requests to the host.
    pub fn min_delay(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second.max(0.001))
    }

    pub fn max_back_off(&self) -> Duration {
        Duration::from_secs(self.max_back_off_secs)
    }
}

/// Caps for the focused spider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiderConfig {
    pub max_depth: usize,
    pub max_pages_visited: usize,
    pub max_pages_known: usize,
    /// Global request-rate floor across the whole spider run.
    pub requests_per_second: u32,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages_visited: 30,
            max_pages_known: 500,
            requests_per_second: 2,
        }
    }
}

/// Top-level crawler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Failures after which a link is promoted to BLOCKED.
    #[serde(default = "default_max_failures")]
    pub max_failures: i32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub host_defaults: HostPolicy,

    /// Stricter pacing for known-fragile hosts, keyed by host.
    #[serde(default)]
    pub host_overrides: HashMap<String, HostPolicy>,

    #[serde(default = "default_robots_ttl_hours")]
    pub robots_ttl_hours: u64,

    /// Shorter TTL cached when the robots.txt fetch itself fails.
    #[serde(default = "default_robots_error_ttl_hours")]
    pub robots_error_ttl_hours: u64,

    #[serde(default)]
    pub spider: SpiderConfig,

    /// Links selected per site per crawl pass.
    #[serde(default = "default_max_per_site")]
    pub max_per_site: usize,

    #[serde(default = "default_max_concurrent_extractions")]
    pub max_concurrent_extractions: usize,

    /// Pause between extraction batches within one site.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Discovery strategies by name, tried in order; first non-empty
    /// wins.
    #[serde(default = "default_discovery_order")]
    pub discovery_order: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config uses defaults")
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn robots_ttl(&self) -> Duration {
        Duration::from_secs(self.robots_ttl_hours * 3600)
    }

    pub fn robots_error_ttl(&self) -> Duration {
        Duration::from_secs(self.robots_error_ttl_hours * 3600)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Policy for a host, falling back to the defaults.
    pub fn policy_for(&self, host: &str) -> HostPolicy {
        self.host_overrides
            .get(host)
            .cloned()
            .unwrap_or_else(|| self.host_defaults.clone())
    }

    /// Extraction batch size, capped at five per site regardless of
    /// how generous the configured concurrency is.
    pub fn extraction_batch_size(&self) -> usize {
        self.max_concurrent_extractions.clamp(1, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CrawlerConfig::default();
        assert_eq!(config.request_timeout_secs, 20);
        assert_eq!(config.max_failures, 3);
        assert!((config.host_defaults.requests_per_second - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.host_defaults.min_delay(), Duration::from_secs(2));
    }

    #[test]
    fn host_override_wins() {
        let raw = r#"{
            "host_overrides": {
                "fragile.example": {
                    "requests_per_second": 0.3,
                    "max_concurrent": 1,
                    "back_off_factor": 3.0,
                    "max_back_off_secs": 600
                }
            }
        }"#;
        let config: CrawlerConfig = serde_json::from_str(raw).unwrap();
        let policy = config.policy_for("fragile.example");
        assert_eq!(policy.max_concurrent, 1);
        let fallback = config.policy_for("other.example");
        assert_eq!(fallback.max_concurrent, 2);
    }

    #[test]
    fn batch_size_is_capped_at_five() {
        let mut config = CrawlerConfig::default();
        config.max_concurrent_extractions = 20;
        assert_eq!(config.extraction_batch_size(), 5);
        config.max_concurrent_extractions = 0;
        assert_eq!(config.extraction_batch_size(), 1);
    }

    #[test]
    fn discovery_order_can_be_overridden() {
        let config: CrawlerConfig =
            serde_json::from_str(r#"{"discovery_order": ["feeds", "homepage"]}"#).unwrap();
        assert_eq!(config.discovery_order, vec!["feeds", "homepage"]);

        let config = CrawlerConfig::default();
        assert_eq!(config.discovery_order.first().map(String::as_str), Some("spider"));
        assert_eq!(config.discovery_order.len(), 5);
    }

    #[test]
    fn zero_rate_does_not_divide_by_zero() {
        let policy = HostPolicy {
            requests_per_second: 0.0,
            ..HostPolicy::default()
        };
        assert!(policy.min_delay() <= Duration::from_secs(1000));
    }
}
