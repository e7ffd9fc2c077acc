//! Per-host admission control.
//!
//! Every outbound request goes through [`HostPacer::acquire`], which
//! enforces, in order: the host's robots.txt policy, the per-host
//! concurrency cap, and the adaptive inter-request delay. Callers hand
//! the returned permit back with the request outcome so the delay can
//! relax on success and grow on failure.

pub mod robots;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use url::Url;

use crate::config::{CrawlerConfig, HostPolicy};
use crate::error::{CrawlError, CrawlResult};
use crate::fetch::HttpFetcher;
use self::robots::{host_key, RobotsCache};

/// Result of one paced request, reported back on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    /// Transport failure or 5xx: grows the back-off delay.
    Failure,
    /// 429: the host told us exactly how long to stay away.
    RateLimited { retry_after_secs: Option<u64> },
    /// Other 4xx: our problem, not load-related; no back-off growth.
    ClientError,
}

impl FetchOutcome {
    /// Classify an HTTP status (with optional Retry-After) into an
    /// outcome.
    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        match status {
            200..=299 => FetchOutcome::Success,
            429 => FetchOutcome::RateLimited {
                retry_after_secs: retry_after.map(|d| d.as_secs()),
            },
            400..=499 => FetchOutcome::ClientError,
            _ => FetchOutcome::Failure,
        }
    }
}

struct PaceState {
    current_delay: Duration,
    last_request: Option<Instant>,
    rate_limited_until: Option<Instant>,
    recent: VecDeque<Instant>,
}

struct HostState {
    host: String,
    policy: HostPolicy,
    semaphore: Arc<Semaphore>,
    pace: Mutex<PaceState>,
}

/// Snapshot of one host's pacing state, for the stats surface.
#[derive(Debug, Clone)]
pub struct HostPacerStats {
    pub host: String,
    pub requests_last_minute: usize,
    pub current_delay_ms: u64,
    pub in_flight: usize,
    pub rate_limited: bool,
}

/// Permission to issue one request to a host. Consumed by
/// [`HostPermit::release`]; dropping it without releasing frees the
/// concurrency slot without touching the adaptive delay.
pub struct HostPermit {
    state: Arc<HostState>,
    _permit: OwnedSemaphorePermit,
}

impl HostPermit {
    pub fn release(self, outcome: FetchOutcome) {
        let mut pace = self.state.pace.lock().expect("pacer lock poisoned");
        let policy = &self.state.policy;

        match outcome {
            FetchOutcome::Success => {
                pace.current_delay = pace.current_delay.mul_f64(0.9).max(policy.min_delay());
            }
            FetchOutcome::Failure => {
                pace.current_delay = pace
                    .current_delay
                    .mul_f64(policy.back_off_factor)
                    .min(policy.max_back_off());
                tracing::warn!(
                    host = %self.state.host,
                    delay_ms = pace.current_delay.as_millis() as u64,
                    "Back-off grown after failure"
                );
            }
            FetchOutcome::RateLimited { retry_after_secs } => {
                pace.current_delay = pace
                    .current_delay
                    .mul_f64(policy.back_off_factor)
                    .min(policy.max_back_off());
                let hold = retry_after_secs
                    .map(Duration::from_secs)
                    .unwrap_or(pace.current_delay);
                pace.rate_limited_until = Some(Instant::now() + hold);
                tracing::warn!(
                    host = %self.state.host,
                    hold_secs = hold.as_secs(),
                    "Host rate-limited us, honouring Retry-After"
                );
            }
            FetchOutcome::ClientError => {}
        }
    }
}

/// Gate for all outbound HTTP requests: robots.txt, per-host
/// concurrency, adaptive pacing.
pub struct HostPacer {
    user_agent: String,
    config: Arc<CrawlerConfig>,
    robots: RobotsCache,
    hosts: Mutex<HashMap<String, Arc<HostState>>>,
}

impl HostPacer {
    pub fn new(config: Arc<CrawlerConfig>, fetcher: HttpFetcher) -> Self {
        let robots = RobotsCache::new(fetcher, config.robots_ttl(), config.robots_error_ttl());
        Self {
            user_agent: config.user_agent.clone(),
            config,
            robots,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Block until a slot is available for `url`'s host.
    ///
    /// Fails with `RobotsDisallowed` when the cached policy forbids the
    /// URL, and with `RateLimited` when the wait would exceed the
    /// host's back-off ceiling (the caller is expected to retry on a
    /// later pass rather than camp on the semaphore).
    pub async fn acquire(&self, url: &Url) -> CrawlResult<HostPermit> {
        let state = self.admit(url).await?;

        let permit = state
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CrawlError::Cancelled)?;

        loop {
            let wait = {
                let mut pace = state.pace.lock().expect("pacer lock poisoned");
                match next_slot(&mut pace, &state.policy) {
                    None => break,
                    Some(wait) => wait,
                }
            };
            if wait > state.policy.max_back_off() {
                return Err(CrawlError::RateLimited {
                    host: state.host.clone(),
                    retry_after: wait,
                });
            }
            tokio::time::sleep(wait).await;
        }

        Ok(HostPermit {
            state,
            _permit: permit,
        })
    }

    /// Non-blocking variant: fails with `RateLimited` instead of
    /// waiting for a pacing slot or a free concurrency slot.
    pub async fn try_acquire(&self, url: &Url) -> CrawlResult<HostPermit> {
        let state = self.admit(url).await?;

        let permit = state.semaphore.clone().try_acquire_owned().map_err(|_| {
            CrawlError::RateLimited {
                host: state.host.clone(),
                retry_after: state.policy.min_delay(),
            }
        })?;

        let wait = {
            let mut pace = state.pace.lock().expect("pacer lock poisoned");
            next_slot(&mut pace, &state.policy)
        };
        if let Some(wait) = wait {
            return Err(CrawlError::RateLimited {
                host: state.host.clone(),
                retry_after: wait,
            });
        }

        Ok(HostPermit {
            state,
            _permit: permit,
        })
    }

    /// Sitemap URLs advertised by the host's robots.txt.
    pub async fn sitemap_urls(&self, base_url: &Url) -> Vec<String> {
        self.robots.policy_for(base_url).await.sitemaps().to_vec()
    }

    /// Pacing snapshot for every host seen so far.
    pub fn stats(&self) -> Vec<HostPacerStats> {
        let hosts = self.hosts.lock().expect("pacer lock poisoned");
        let now = Instant::now();
        hosts
            .values()
            .map(|state| {
                let pace = state.pace.lock().expect("pacer lock poisoned");
                HostPacerStats {
                    host: state.host.clone(),
                    requests_last_minute: pace
                        .recent
                        .iter()
                        .filter(|t| now.duration_since(**t) < Duration::from_secs(60))
                        .count(),
                    current_delay_ms: pace.current_delay.as_millis() as u64,
                    in_flight: state.policy.max_concurrent - state.semaphore.available_permits(),
                    rate_limited: pace.rate_limited_until.is_some_and(|until| until > now),
                }
            })
            .collect()
    }

    /// Access to the robots cache (tests pre-seed policies here).
    pub fn robots(&self) -> &RobotsCache {
        &self.robots
    }

    /// Robots check plus host-state lookup, shared by both acquire
    /// flavours.
    async fn admit(&self, url: &Url) -> CrawlResult<Arc<HostState>> {
        let key = host_key(url).ok_or_else(|| CrawlError::InvalidUrl {
            url: url.to_string(),
        })?;

        let policy_doc = self.robots.policy_for(url).await;
        if !policy_doc.allows(&self.user_agent, url.path()) {
            return Err(CrawlError::RobotsDisallowed {
                url: url.to_string(),
            });
        }

        let mut hosts = self.hosts.lock().expect("pacer lock poisoned");
        let state = hosts.entry(key.clone()).or_insert_with(|| {
            let mut policy = self.config.policy_for(&key);
            // robots.txt crawl-delay raises the pacing floor.
            if let Some(delay) = policy_doc.crawl_delay(&self.user_agent) {
                if delay > policy.min_delay() {
                    policy.requests_per_second = 1.0 / delay.as_secs_f64();
                }
            }
            Arc::new(HostState {
                host: key,
                semaphore: Arc::new(Semaphore::new(policy.max_concurrent)),
                pace: Mutex::new(PaceState {
                    current_delay: policy.min_delay(),
                    last_request: None,
                    rate_limited_until: None,
                    recent: VecDeque::with_capacity(100),
                }),
                policy,
            })
        });
        Ok(Arc::clone(state))
    }
}

/// Claim the next request slot, or report how long to wait. On claim,
/// the request is stamped into the rolling history.
fn next_slot(pace: &mut PaceState, policy: &HostPolicy) -> Option<Duration> {
    let now = Instant::now();

    let mut ready_at = match pace.last_request {
        Some(last) => last + pace.current_delay.max(policy.min_delay()),
        None => now,
    };
    if let Some(until) = pace.rate_limited_until {
        if until > ready_at {
            ready_at = until;
        }
    }

    if ready_at > now {
        return Some(ready_at - now);
    }

    pace.last_request = Some(now);
    if pace.rate_limited_until.is_some_and(|until| until <= now) {
        pace.rate_limited_until = None;
    }
    if pace.recent.len() == 100 {
        pace.recent.pop_front();
    }
    pace.recent.push_back(now);
    None
}
