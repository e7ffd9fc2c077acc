//! End-to-end pipeline scenarios over the in-memory stores: discovery
//! to dual-store commit to semantic retrieval, without any network.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use url::Url;

use crawler::discover::{Candidate, SiteDiscoverer};
use crawler::extract::{ArticleExtractor, ExtractedContent, ExtractionContext};
use crawler::{CrawlError, CrawlResult, CrawlerConfig};
use pipeline::retriever::{SearchRequest, SemanticRetriever};
use pipeline::CrawlOrchestrator;
use registry::domain::MaxResults;
use registry::{Domain, DomainRegistry, Env, SiteConfig, SiteRegistry};
use store::models::link::LinkState;
use store::{HashEmbedder, LinkStore, MemoryLinkStore, MemoryVectorStore, VectorStore};

const COLLECTION: &str = "news_football_dev";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn football_domain(active: bool) -> Domain {
    Domain {
        id: "football".to_string(),
        name: "Football".to_string(),
        description: String::new(),
        active,
        keywords: vec!["Inter".to_string(), "Juventus".to_string()],
        max_results: MaxResults { dev: 10, prod: 50 },
        vector_collection_prefix: "news".to_string(),
    }
}

fn registries(domain_active: bool) -> (DomainRegistry, SiteRegistry) {
    let mut domains = IndexMap::new();
    domains.insert("football".to_string(), football_domain(domain_active));
    let domains = DomainRegistry::from_domains(domains);

    let raw = serde_json::json!({
        "sites": {
            "gazzetta": {
                "name": "Gazzetta",
                "base_url": "https://example.gazzetta.test",
                "domain": "football",
                "active": true,
                "language": "it"
            }
        }
    });
    let sites: SiteRegistry = {
        #[derive(serde::Deserialize)]
        struct SitesFile {
            sites: IndexMap<String, SiteConfig>,
        }
        let file: SitesFile = serde_json::from_value(raw).unwrap();
        let mut map = file.sites;
        for (id, site) in map.iter_mut() {
            site.id = id.clone();
        }
        SiteRegistry::from_parts(map, IndexMap::new())
    };

    (domains, sites)
}

/// Discoverer returning a fixed candidate list.
struct FixedDiscoverer {
    urls: Vec<&'static str>,
}

#[async_trait]
impl SiteDiscoverer for FixedDiscoverer {
    async fn discover_site(
        &self,
        _site: &SiteConfig,
        _domain: &Domain,
    ) -> CrawlResult<Vec<Candidate>> {
        Ok(self
            .urls
            .iter()
            .map(|u| Candidate::new(Url::parse(u).unwrap(), None, 1))
            .collect())
    }
}

enum Scripted {
    Article { title: &'static str, body: String },
    ServerError,
    RobotsDenied,
}

/// Extractor with a scripted outcome per URL.
struct ScriptedExtractor {
    outcomes: HashMap<String, Scripted>,
}

#[async_trait]
impl ArticleExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        url: &Url,
        ctx: &ExtractionContext,
    ) -> CrawlResult<ExtractedContent> {
        match self.outcomes.get(url.as_str()) {
            Some(Scripted::Article { title, body }) => Ok(ExtractedContent {
                url: url.clone(),
                title: title.to_string(),
                text: body.clone(),
                author: Some("Mario Rossi".to_string()),
                published_date: Some(chrono::Utc::now()),
                description: None,
                source: "gazzetta".to_string(),
                language: Some("it".to_string()),
                domain: ctx.domain.clone(),
                quality_score: 0.85,
                keywords: vec!["Inter".to_string()],
                content_length: body.chars().count(),
                fetch_elapsed: std::time::Duration::from_millis(40),
                metadata: serde_json::json!({}),
            }),
            Some(Scripted::ServerError) => Err(CrawlError::Status {
                url: url.to_string(),
                status: 500,
            }),
            Some(Scripted::RobotsDenied) => Err(CrawlError::RobotsDisallowed {
                url: url.to_string(),
            }),
            None => Err(CrawlError::NoContent {
                url: url.to_string(),
            }),
        }
    }
}

struct Pipeline {
    links: Arc<MemoryLinkStore>,
    vectors: Arc<MemoryVectorStore>,
    embedder: Arc<HashEmbedder>,
    domains: DomainRegistry,
    orchestrator:
        CrawlOrchestrator<MemoryLinkStore, MemoryVectorStore, HashEmbedder>,
}

fn build(
    domain_active: bool,
    discoverer: FixedDiscoverer,
    extractor: ScriptedExtractor,
) -> Pipeline {
    let (domains, sites) = registries(domain_active);
    let links = Arc::new(MemoryLinkStore::new());
    let vectors = Arc::new(MemoryVectorStore::new());
    let embedder = Arc::new(HashEmbedder::new(256));
    let mut config = CrawlerConfig::default();
    config.batch_delay_ms = 0;

    let orchestrator = CrawlOrchestrator::new(
        domains.clone(),
        sites,
        Env::Dev,
        Arc::new(config),
        Arc::clone(&links),
        Arc::clone(&vectors),
        Arc::clone(&embedder),
        Arc::new(discoverer),
        Arc::new(extractor),
    );
    Pipeline {
        links,
        vectors,
        embedder,
        domains,
        orchestrator,
    }
}

fn body(text: &str) -> String {
    format!("{text} {}", "cronaca della partita ".repeat(60))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_domain_crawl_counts_and_states() {
    let discoverer = FixedDiscoverer {
        urls: vec![
            "https://example.gazzetta.test/news/derby-1",
            "https://example.gazzetta.test/news/transfer-2",
            "https://example.gazzetta.test/news/broken-3",
        ],
    };
    let mut outcomes = HashMap::new();
    outcomes.insert(
        "https://example.gazzetta.test/news/derby-1".to_string(),
        Scripted::Article {
            title: "Inter wins derby",
            body: body("Inter beat Milan, Lautaro scored twice in the derby."),
        },
    );
    outcomes.insert(
        "https://example.gazzetta.test/news/transfer-2".to_string(),
        Scripted::Article {
            title: "Juventus signs midfielder",
            body: body("Juventus completed the signing of a new midfielder."),
        },
    );
    outcomes.insert(
        "https://example.gazzetta.test/news/broken-3".to_string(),
        Scripted::ServerError,
    );

    let pipeline = build(true, discoverer, ScriptedExtractor { outcomes });
    let counters = pipeline.orchestrator.crawl_domain("football").await.unwrap();

    assert_eq!(counters.sites_processed, 1);
    assert_eq!(counters.links_discovered, 3);
    assert_eq!(counters.links_crawled, 3);
    assert_eq!(counters.articles_extracted, 2);
    assert_eq!(counters.errors, 1);

    assert_eq!(pipeline.links.links_in_state(LinkState::Crawled).len(), 2);
    let failed = pipeline.links.links_in_state(LinkState::Failed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_count, 1);

    assert_eq!(pipeline.links.article_count(), 2);
    assert_eq!(pipeline.vectors.count(COLLECTION).await.unwrap(), 2);
    // Every terminal failure leaves an attempt row with a message.
    let attempts = pipeline.links.attempts_for_link(failed[0].id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].error_message.as_deref().unwrap().contains("500"));
}

#[tokio::test]
async fn rediscovery_adds_no_new_rows() {
    let urls = vec![
        "https://example.gazzetta.test/news/derby-1",
        "https://example.gazzetta.test/news/transfer-2",
    ];
    let mut outcomes = HashMap::new();
    for url in &urls {
        outcomes.insert(
            url.to_string(),
            Scripted::Article {
                title: "Inter wins derby",
                body: body(url),
            },
        );
    }
    let pipeline = build(
        true,
        FixedDiscoverer { urls: urls.clone() },
        ScriptedExtractor { outcomes },
    );

    let first = pipeline.orchestrator.crawl_domain("football").await.unwrap();
    assert_eq!(first.links_discovered, 2);

    let second = pipeline.orchestrator.crawl_domain("football").await.unwrap();
    assert_eq!(second.links_discovered, 0);
    assert_eq!(pipeline.links.link_count(), 2);
}

#[tokio::test]
async fn duplicate_content_fails_the_second_link() {
    let same_body = body("Inter beat Milan, identical body.");
    let mut outcomes = HashMap::new();
    outcomes.insert(
        "https://example.gazzetta.test/news/derby-1".to_string(),
        Scripted::Article {
            title: "Inter wins derby",
            body: same_body.clone(),
        },
    );
    outcomes.insert(
        "https://example.gazzetta.test/news/derby-1?utm=feed".to_string(),
        Scripted::Article {
            title: "Inter wins derby",
            body: same_body,
        },
    );
    let pipeline = build(
        true,
        FixedDiscoverer {
            urls: vec![
                "https://example.gazzetta.test/news/derby-1",
                "https://example.gazzetta.test/news/derby-1?utm=feed",
            ],
        },
        ScriptedExtractor { outcomes },
    );

    let counters = pipeline.orchestrator.crawl_domain("football").await.unwrap();

    assert_eq!(counters.articles_extracted, 1);
    assert_eq!(counters.errors, 1);
    assert_eq!(pipeline.links.article_count(), 1);
    assert_eq!(pipeline.vectors.count(COLLECTION).await.unwrap(), 1);

    // The duplicate failure does not count toward BLOCKED promotion.
    let failed = pipeline.links.links_in_state(LinkState::Failed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_count, 0);
}

#[tokio::test]
async fn inactive_domain_contributes_zero_links() {
    let pipeline = build(
        false,
        FixedDiscoverer {
            urls: vec!["https://example.gazzetta.test/news/derby-1"],
        },
        ScriptedExtractor {
            outcomes: HashMap::new(),
        },
    );

    // Direct domain crawl refuses the inactive domain.
    assert!(pipeline.orchestrator.crawl_domain("football").await.is_err());

    // A full crawl records the config error and creates nothing.
    let counters = pipeline.orchestrator.crawl_all(None).await;
    assert_eq!(counters.errors, 1);
    assert_eq!(counters.links_discovered, 0);
    assert_eq!(pipeline.links.link_count(), 0);
}

#[tokio::test]
async fn politeness_denials_never_promote_to_blocked() {
    let mut outcomes = HashMap::new();
    outcomes.insert(
        "https://example.gazzetta.test/news/derby-1".to_string(),
        Scripted::RobotsDenied,
    );
    let pipeline = build(
        true,
        FixedDiscoverer {
            urls: vec!["https://example.gazzetta.test/news/derby-1"],
        },
        ScriptedExtractor { outcomes },
    );

    pipeline.orchestrator.crawl_domain("football").await.unwrap();
    let failed = pipeline.links.links_in_state(LinkState::Failed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_count, 0);
    let attempts = pipeline.links.attempts_for_link(failed[0].id).await.unwrap();
    assert!(attempts[0]
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("politeness"));
}

#[tokio::test]
async fn crawl_then_search_finds_the_ingested_article() {
    let mut outcomes = HashMap::new();
    outcomes.insert(
        "https://example.gazzetta.test/news/derby-1".to_string(),
        Scripted::Article {
            title: "Inter wins derby",
            body: body("Inter beat Milan and Lautaro scored twice in the derby at San Siro."),
        },
    );
    outcomes.insert(
        "https://example.gazzetta.test/news/transfer-2".to_string(),
        Scripted::Article {
            title: "Juventus signs midfielder",
            body: body("Juventus completed a transfer for a promising midfielder."),
        },
    );
    let pipeline = build(
        true,
        FixedDiscoverer {
            urls: vec![
                "https://example.gazzetta.test/news/derby-1",
                "https://example.gazzetta.test/news/transfer-2",
            ],
        },
        ScriptedExtractor { outcomes },
    );

    pipeline.orchestrator.crawl_domain("football").await.unwrap();

    let retriever = SemanticRetriever::new(
        pipeline.domains.clone(),
        Env::Dev,
        Arc::clone(&pipeline.links),
        Arc::clone(&pipeline.vectors),
        Arc::clone(&pipeline.embedder),
    );
    let hits = retriever
        .search(&SearchRequest {
            question: "who scored in the derby?".to_string(),
            domain: Some("football".to_string()),
            k: 3,
            time_range: None,
            min_quality: None,
        })
        .await
        .unwrap();

    assert!(!hits.is_empty() && hits.len() <= 3);
    assert_eq!(hits[0].title, "Inter wins derby");
    // Similarity is monotonically non-increasing and hits are enriched.
    for pair in hits.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
    assert_eq!(hits[0].site_name.as_deref(), Some("Gazzetta"));
    assert!(hits[0].discovered_at.is_some());
    assert!(hits[0].last_crawled_at.is_some());
}

#[tokio::test]
async fn blocked_links_are_never_selected_again() {
    let mut outcomes = HashMap::new();
    outcomes.insert(
        "https://example.gazzetta.test/news/broken-1".to_string(),
        Scripted::ServerError,
    );
    let pipeline = build(
        true,
        FixedDiscoverer {
            urls: vec!["https://example.gazzetta.test/news/broken-1"],
        },
        ScriptedExtractor { outcomes },
    );

    // Default max_failures is 3: three failing passes exhaust the link.
    pipeline.orchestrator.crawl_domain("football").await.unwrap();
    for _ in 0..2 {
        let link = pipeline.links.links_in_state(LinkState::Failed).pop().unwrap();
        // Age the failure into the refresh window, then retry.
        pipeline
            .links
            .force_last_crawled(link.id, chrono::Utc::now() - chrono::Duration::days(2));
        pipeline.orchestrator.crawl_all(Some(24)).await;
    }

    let blocked = pipeline.links.links_in_state(LinkState::Blocked);
    assert_eq!(blocked.len(), 1);
    assert!(blocked[0].error_count >= 3);

    // A further pass finds nothing to do.
    let counters = pipeline.orchestrator.crawl_all(Some(24)).await;
    assert_eq!(counters.links_crawled, 0);
}
