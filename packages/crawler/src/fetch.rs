//! HTTP fetching with realistic browser-like headers.

use std::time::{Duration, Instant};

use reqwest::header;
use url::Url;

use crate::config::CrawlerConfig;
use crate::error::{CrawlError, CrawlResult};

/// One fetched page. Non-success statuses are returned, not raised, so
/// callers can account for them (429 Retry-After, back-off on 5xx).
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub body: String,
    /// Parsed Retry-After header, when the server sent one.
    pub retry_after: Option<Duration>,
    pub elapsed: Duration,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Raise the transport error the status implies, if any.
    pub fn require_success(self) -> CrawlResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CrawlError::Status {
                url: self.url.to_string(),
                status: self.status,
            })
        }
    }
}

/// Shared HTTP client for all outbound requests.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> CrawlResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                .parse()
                .expect("static header value"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            "en-US,en;q=0.5".parse().expect("static header value"),
        );
        headers.insert(header::CONNECTION, "keep-alive".parse().expect("static header value"));
        headers.insert("DNT", "1".parse().expect("static header value"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            "1".parse().expect("static header value"),
        );

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(CrawlError::ClientBuild)?;

        Ok(Self { client })
    }

    /// GET a page. `language_hint` is the site's locale (e.g. `it`) and
    /// sharpens the Accept-Language header for that request.
    pub async fn fetch(&self, url: &Url, language_hint: Option<&str>) -> CrawlResult<FetchedPage> {
        let started = Instant::now();

        let mut request = self.client.get(url.clone());
        if let Some(lang) = language_hint {
            request = request.header(
                header::ACCEPT_LANGUAGE,
                format!("{lang},{lang};q=0.9,en;q=0.5"),
            );
        }

        let response = request.send().await.map_err(|source| {
            if source.is_timeout() {
                CrawlError::Timeout {
                    url: url.to_string(),
                }
            } else {
                CrawlError::Http {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let final_url = response.url().clone();

        let body = response.text().await.map_err(|source| {
            if source.is_timeout() {
                CrawlError::Timeout {
                    url: url.to_string(),
                }
            } else {
                CrawlError::Http {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        let elapsed = started.elapsed();
        tracing::debug!(
            url = %final_url,
            status = status,
            bytes = body.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Fetched page"
        );

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
            retry_after,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(status: u16) -> FetchedPage {
        FetchedPage {
            url: Url::parse("https://example.test/a").unwrap(),
            status,
            body: String::new(),
            retry_after: None,
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn require_success_passes_2xx() {
        assert!(page(200).require_success().is_ok());
        assert!(page(204).require_success().is_ok());
    }

    #[test]
    fn require_success_raises_status_error() {
        match page(503).require_success() {
            Err(CrawlError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
