//! Content extraction: one candidate URL in, one validated and scored
//! article record out (or a typed rejection).

pub mod dates;
pub mod keywords;
pub mod quality;
pub mod text;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use url::Url;

use crate::config::CrawlerConfig;
use crate::error::{CrawlError, CrawlResult};
use crate::fetch::HttpFetcher;
use crate::pacer::{FetchOutcome, HostPacer};
use self::quality::QualitySignals;

/// Minimum accepted body length, in characters.
pub const MIN_TEXT_CHARS: usize = 200;
/// Bodies longer than this are truncated, not rejected.
pub const MAX_TEXT_CHARS: usize = 50_000;
/// Minimum accepted title length, in characters.
pub const MIN_TITLE_CHARS: usize = 10;

/// Per-site inputs to an extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    pub domain: String,
    /// Domain keywords in declaration order; empty disables the
    /// relevance gate.
    pub keywords: Vec<String>,
    /// BCP 47 hint for the Accept-Language header.
    pub language: Option<String>,
    /// Fallback source name when the page does not declare one.
    pub site_name: Option<String>,
}

/// A validated, scored article ready for the store coordinator.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub url: Url,
    pub title: String,
    pub text: String,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    /// Publisher name: page-declared sitename, else the leftmost host
    /// label, else "unknown".
    pub source: String,
    pub language: Option<String>,
    pub domain: String,
    pub quality_score: f32,
    pub keywords: Vec<String>,
    pub content_length: usize,
    pub fetch_elapsed: Duration,
    pub metadata: serde_json::Value,
}

/// Seam for the orchestrator: anything that can turn a URL into an
/// article record.
#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    async fn extract(&self, url: &Url, ctx: &ExtractionContext) -> CrawlResult<ExtractedContent>;
}

/// The production extractor: paced fetch, main-text extraction,
/// validation, scoring, keyword gate.
pub struct ContentExtractor {
    fetcher: HttpFetcher,
    pacer: Arc<HostPacer>,
    #[allow(dead_code)]
    config: Arc<CrawlerConfig>,
}

impl ContentExtractor {
    pub fn new(fetcher: HttpFetcher, pacer: Arc<HostPacer>, config: Arc<CrawlerConfig>) -> Self {
        Self {
            fetcher,
            pacer,
            config,
        }
    }

    /// Validate and score already-fetched HTML. Pure (no I/O); the
    /// async path delegates here once the page is down.
    pub fn process_html(
        url: &Url,
        html: &str,
        status: u16,
        fetch_elapsed: Duration,
        ctx: &ExtractionContext,
    ) -> CrawlResult<ExtractedContent> {
        let page = text::extract_page(html);

        if page.text.is_empty() {
            return Err(CrawlError::NoContent {
                url: url.to_string(),
            });
        }

        let mut body = page.text;
        let char_count = body.chars().count();
        if char_count < MIN_TEXT_CHARS {
            return Err(CrawlError::ContentTooShort {
                url: url.to_string(),
                length: char_count,
            });
        }
        if char_count > MAX_TEXT_CHARS {
            body = body.chars().take(MAX_TEXT_CHARS).collect();
        }

        let title = page.title.unwrap_or_default();
        let title_len = title.chars().count();
        if title_len < MIN_TITLE_CHARS {
            return Err(CrawlError::TitleTooShort {
                url: url.to_string(),
                length: title_len,
            });
        }

        let matched = keywords::matched_keywords(&ctx.keywords, &title, &body);
        if !ctx.keywords.is_empty() && matched.is_empty() {
            return Err(CrawlError::OffTopic {
                url: url.to_string(),
                domain: ctx.domain.clone(),
            });
        }

        let published_date = page.published.as_deref().and_then(dates::parse_published);

        let quality_score = quality::score(QualitySignals {
            title: &title,
            text: &body,
            has_author: page.author.is_some(),
            has_date: published_date.is_some(),
            has_description: page.description.is_some(),
        });

        let source = page
            .sitename
            .clone()
            .or_else(|| ctx.site_name.clone())
            .or_else(|| {
                url.host_str()
                    .and_then(|host| {
                        host.trim_start_matches("www.")
                            .split('.')
                            .next()
                            .map(str::to_string)
                    })
                    .filter(|label| !label.is_empty())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = json!({
            "http_status": status,
            "fetch_elapsed_ms": fetch_elapsed.as_millis() as u64,
            "raw_published": page.published,
            "sitename": page.sitename,
            "language": page.language,
            "truncated": char_count > MAX_TEXT_CHARS,
        });

        let content_length = body.chars().count();
        Ok(ExtractedContent {
            url: url.clone(),
            title,
            text: body,
            author: page.author,
            published_date,
            description: page.description,
            source,
            language: page.language,
            domain: ctx.domain.clone(),
            quality_score,
            keywords: matched,
            content_length,
            fetch_elapsed,
            metadata,
        })
    }
}

#[async_trait]
impl ArticleExtractor for ContentExtractor {
    async fn extract(&self, url: &Url, ctx: &ExtractionContext) -> CrawlResult<ExtractedContent> {
        let permit = self.pacer.acquire(url).await?;

        let page = match self.fetcher.fetch(url, ctx.language.as_deref()).await {
            Ok(page) => page,
            Err(err) => {
                permit.release(FetchOutcome::Failure);
                return Err(err);
            }
        };

        permit.release(FetchOutcome::from_status(page.status, page.retry_after));
        let page = page.require_success()?;

        let result = Self::process_html(url, &page.body, page.status, page.elapsed, ctx);
        match &result {
            Ok(content) => tracing::info!(
                url = %url,
                title = %content.title,
                quality = content.quality_score,
                keywords = content.keywords.len(),
                chars = content.content_length,
                "Extracted article"
            ),
            Err(err) => tracing::debug!(url = %url, error = %err, "Extraction rejected"),
        }
        result
    }
}
