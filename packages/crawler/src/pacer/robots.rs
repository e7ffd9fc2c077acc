//! robots.txt policy: parsing, per-host caching with TTL, and
//! single-flight download bookkeeping.
//!
//! The parser is deliberately opaque to the rest of the system: the
//! pacer only ever asks [`RobotsPolicy::allows`] and
//! [`RobotsPolicy::sitemaps`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use url::Url;

use crate::fetch::HttpFetcher;

/// One `User-agent` group from a robots.txt file.
#[derive(Debug, Clone, Default)]
struct RuleGroup {
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

#[derive(Debug, Clone)]
struct Rule {
    path: String,
    allow: bool,
}

/// Parsed robots.txt for one host.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    groups: Vec<RuleGroup>,
    sitemaps: Vec<String>,
}

impl RobotsPolicy {
    /// A policy that allows everything. Cached when the robots.txt
    /// fetch fails, so one unreachable file never stalls a host.
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let mut policy = Self::default();
        let mut group = RuleGroup::default();
        let mut in_group_body = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_ascii_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group.
                    if in_group_body {
                        policy.groups.push(std::mem::take(&mut group));
                        in_group_body = false;
                    }
                    group.agents.push(value.to_ascii_lowercase());
                }
                "allow" | "disallow" => {
                    if !value.is_empty() {
                        group.rules.push(Rule {
                            path: value.to_string(),
                            allow: directive == "allow",
                        });
                    }
                    in_group_body = true;
                }
                "crawl-delay" => {
                    group.crawl_delay = value.parse().ok();
                    in_group_body = true;
                }
                "sitemap" => {
                    policy.sitemaps.push(value.to_string());
                }
                _ => {}
            }
        }
        if !group.agents.is_empty() {
            policy.groups.push(group);
        }

        policy
    }

    /// Whether `user_agent` may fetch `path`. Longest matching rule
    /// wins; on equal length an Allow beats a Disallow.
    pub fn allows(&self, user_agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };

        let mut verdict = true;
        let mut best_len = 0;
        for rule in &group.rules {
            if !path.starts_with(rule.path.as_str()) {
                continue;
            }
            let len = rule.path.len();
            if len > best_len || (len == best_len && rule.allow) {
                best_len = len;
                verdict = rule.allow;
            }
        }
        verdict
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.group_for(user_agent)
            .and_then(|g| g.crawl_delay)
            .map(Duration::from_secs_f64)
    }

    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    fn group_for(&self, user_agent: &str) -> Option<&RuleGroup> {
        let agent = user_agent.to_ascii_lowercase();
        // Product token is the part before the first '/'.
        let token = agent.split('/').next().unwrap_or(&agent);

        self.groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a != "*" && token.contains(a.as_str())))
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
    }
}

enum CacheEntry {
    Ready {
        policy: Arc<RobotsPolicy>,
        expires: Instant,
    },
    /// A fetch for this host is in flight; other requests are
    /// temporarily permitted so they do not pile up behind it.
    Downloading,
}

/// Per-host robots.txt cache.
///
/// At most one concurrent fetch per host: the first caller marks the
/// entry `Downloading` and fetches; concurrent callers see a permissive
/// policy until the fetch lands.
pub struct RobotsCache {
    fetcher: HttpFetcher,
    ttl: Duration,
    error_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl RobotsCache {
    pub fn new(fetcher: HttpFetcher, ttl: Duration, error_ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            error_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the policy for `url`'s host, fetching robots.txt when
    /// the cache is cold or expired.
    pub async fn policy_for(&self, url: &Url) -> Arc<RobotsPolicy> {
        let Some(host_key) = host_key(url) else {
            return Arc::new(RobotsPolicy::permissive());
        };

        {
            let mut entries = self.entries.lock().await;
            let fresh = match entries.get(&host_key) {
                Some(CacheEntry::Ready { policy, expires }) if *expires > Instant::now() => {
                    Some(Arc::clone(policy))
                }
                Some(CacheEntry::Downloading) => {
                    // Another task owns the fetch; do not starve.
                    Some(Arc::new(RobotsPolicy::permissive()))
                }
                _ => None,
            };
            match fresh {
                Some(policy) => return policy,
                None => entries.insert(host_key.clone(), CacheEntry::Downloading),
            };
        }

        let (policy, ttl) = self.download(&host_key).await;
        let policy = Arc::new(policy);

        let mut entries = self.entries.lock().await;
        entries.insert(
            host_key,
            CacheEntry::Ready {
                policy: Arc::clone(&policy),
                expires: Instant::now() + ttl,
            },
        );
        policy
    }

    async fn download(&self, host_key: &str) -> (RobotsPolicy, Duration) {
        let robots_url = match Url::parse(&format!("{host_key}/robots.txt")) {
            Ok(url) => url,
            Err(_) => return (RobotsPolicy::permissive(), self.error_ttl),
        };

        match self.fetcher.fetch(&robots_url, None).await {
            Ok(page) if page.is_success() => {
                let policy = RobotsPolicy::parse(&page.body);
                tracing::debug!(host = host_key, sitemaps = policy.sitemaps().len(), "Cached robots.txt");
                (policy, self.ttl)
            }
            Ok(page) => {
                // 404 and friends mean "no restrictions".
                tracing::debug!(host = host_key, status = page.status, "No robots.txt, caching permissive");
                (RobotsPolicy::permissive(), self.ttl)
            }
            Err(err) => {
                tracing::warn!(host = host_key, error = %err, "robots.txt fetch failed, caching permissive with short TTL");
                (RobotsPolicy::permissive(), self.error_ttl)
            }
        }
    }

    /// Pre-seed a host's policy. Used by tests and by operators who
    /// mirror robots files locally.
    pub async fn seed(&self, host_key: &str, policy: RobotsPolicy, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            host_key.to_string(),
            CacheEntry::Ready {
                policy: Arc::new(policy),
                expires: Instant::now() + ttl,
            },
        );
    }
}

/// Host identity for pacing and robots purposes: scheme + authority.
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let key = match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    };
    Some(key)
}
