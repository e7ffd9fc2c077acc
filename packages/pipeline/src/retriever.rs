//! The semantic read path: question → embedding → top-k vector hits →
//! relational enrichment.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use registry::{DomainRegistry, Env};
use store::{Embedder, LinkStore, VectorStore};

/// One search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub question: String,
    /// Restrict to one domain; None searches every active domain.
    pub domain: Option<String>,
    pub k: usize,
    /// Client-side filter on `published_date`.
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub min_quality: Option<f32>,
}

/// A search result, enriched with the link and site rows backing it.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub domain: String,
    pub source_site: String,
    pub similarity: f32,
    pub quality_score: f32,
    pub published_date: Option<DateTime<Utc>>,
    pub keywords: Vec<String>,
    pub link_id: Uuid,
    pub site_name: Option<String>,
    pub discovered_at: Option<DateTime<Utc>>,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

pub struct SemanticRetriever<L, V, E> {
    domains: DomainRegistry,
    env: Env,
    links: Arc<L>,
    vectors: Arc<V>,
    embedder: Arc<E>,
}

impl<L, V, E> SemanticRetriever<L, V, E>
where
    L: LinkStore,
    V: VectorStore,
    E: Embedder,
{
    pub fn new(
        domains: DomainRegistry,
        env: Env,
        links: Arc<L>,
        vectors: Arc<V>,
        embedder: Arc<E>,
    ) -> Self {
        Self {
            domains,
            env,
            links,
            vectors,
            embedder,
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        // The caller's k is taken as-is; the domain's per-environment
        // result cap is only a default for unspecified queries, applied
        // upstream.
        let collections: Vec<String> = match &request.domain {
            Some(domain_id) => {
                let domain = self.domains.require_active(domain_id)?;
                vec![domain.collection_name(self.env)]
            }
            None => self
                .domains
                .active()
                .map(|d| d.collection_name(self.env))
                .collect(),
        };
        let k = request.k;
        if k == 0 || collections.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(&request.question).await?;

        let mut hits = Vec::new();
        for collection in &collections {
            let collection_hits = self
                .vectors
                .query(collection, &embedding, k as i64, request.min_quality)
                .await?;
            hits.extend(collection_hits);
        }

        // Similarity descending, published date as tiebreaker.
        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| b.published_date.cmp(&a.published_date))
        });
        hits.truncate(k);

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some((start, end)) = request.time_range {
                match hit.published_date {
                    Some(published) if published >= start && published <= end => {}
                    _ => continue,
                }
            }

            let link = self.links.link_by_id(hit.link_id).await?;
            let site = match &link {
                Some(link) => self.links.site_by_id(link.site_id).await?,
                None => None,
            };
            let article = self.links.article_by_link(hit.link_id).await?;

            results.push(SearchHit {
                title: hit.title,
                url: hit.url,
                domain: hit.domain,
                source_site: hit.source_site,
                similarity: hit.similarity,
                quality_score: hit.quality_score,
                published_date: hit.published_date,
                keywords: article.map(|a| a.keywords).unwrap_or_default(),
                link_id: hit.link_id,
                site_name: site.map(|s| s.name),
                discovered_at: link.as_ref().map(|l| l.discovered_at),
                last_crawled_at: link.as_ref().and_then(|l| l.last_crawled_at),
            });
        }

        tracing::debug!(
            question_len = request.question.len(),
            collections = collections.len(),
            results = results.len(),
            "Search complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use indexmap::IndexMap;
    use registry::domain::MaxResults;
    use registry::Domain;
    use store::{
        ArticleVector, Embedder as _, HashEmbedder, MemoryLinkStore, MemoryVectorStore,
        VectorStore as _,
    };

    fn domains() -> DomainRegistry {
        let mut map = IndexMap::new();
        map.insert(
            "football".to_string(),
            Domain {
                id: String::new(),
                name: "Football".to_string(),
                description: String::new(),
                active: true,
                keywords: vec!["Inter".to_string()],
                max_results: MaxResults { dev: 2, prod: 50 },
                vector_collection_prefix: "news".to_string(),
            },
        );
        DomainRegistry::from_domains(map)
    }

    async fn seed_vectors(
        vectors: &MemoryVectorStore,
        embedder: &HashEmbedder,
        titles: &[(&str, Option<DateTime<Utc>>)],
    ) {
        for (title, published) in titles {
            let embedding = embedder.embed(title).await.unwrap();
            vectors
                .upsert(
                    "news_football_dev",
                    &ArticleVector {
                        title: title.to_string(),
                        body: format!("{title} body"),
                        url: format!("https://s.test/{}", title.replace(' ', "-")),
                        source_site: "gazzetta".to_string(),
                        domain: "football".to_string(),
                        published_date: *published,
                        extracted_at: Utc::now(),
                        quality_score: 0.8,
                        keywords: vec![],
                        link_id: Uuid::now_v7(),
                    },
                    &embedding,
                )
                .await
                .unwrap();
        }
    }

    fn retriever(
        vectors: Arc<MemoryVectorStore>,
        embedder: Arc<HashEmbedder>,
    ) -> SemanticRetriever<MemoryLinkStore, MemoryVectorStore, HashEmbedder> {
        SemanticRetriever::new(
            domains(),
            Env::Dev,
            Arc::new(MemoryLinkStore::new()),
            vectors,
            embedder,
        )
    }

    #[tokio::test]
    async fn explicit_k_is_honoured_beyond_the_domain_default() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(64));
        seed_vectors(
            &vectors,
            &embedder,
            &[("derby one", None), ("derby two", None), ("derby three", None)],
        )
        .await;

        // The domain's dev cap is 2, but an explicit k overrides it:
        // the cap is only a default for unspecified queries.
        let hits = retriever(Arc::clone(&vectors), Arc::clone(&embedder))
            .search(&SearchRequest {
                question: "derby".to_string(),
                domain: Some("football".to_string()),
                k: 10,
                time_range: None,
                min_quality: None,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);

        // A smaller explicit k still bounds the result list.
        let hits = retriever(Arc::clone(&vectors), embedder)
            .search(&SearchRequest {
                question: "derby".to_string(),
                domain: Some("football".to_string()),
                k: 1,
                time_range: None,
                min_quality: None,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn time_range_filters_on_published_date() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(64));
        let now = Utc::now();
        seed_vectors(
            &vectors,
            &embedder,
            &[
                ("fresh derby", Some(now - Duration::hours(2))),
                ("stale derby", Some(now - Duration::days(30))),
                ("undated derby", None),
            ],
        )
        .await;

        let mut domains_map = IndexMap::new();
        domains_map.insert(
            "football".to_string(),
            Domain {
                id: String::new(),
                name: "Football".to_string(),
                description: String::new(),
                active: true,
                keywords: vec![],
                max_results: MaxResults { dev: 10, prod: 50 },
                vector_collection_prefix: "news".to_string(),
            },
        );
        let retriever = SemanticRetriever::new(
            DomainRegistry::from_domains(domains_map),
            Env::Dev,
            Arc::new(MemoryLinkStore::new()),
            vectors,
            embedder,
        );

        let hits = retriever
            .search(&SearchRequest {
                question: "derby".to_string(),
                domain: Some("football".to_string()),
                k: 10,
                time_range: Some((now - Duration::days(1), now)),
                min_quality: None,
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "fresh derby");
    }

    #[tokio::test]
    async fn unknown_domain_is_an_error() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(64));
        let result = retriever(vectors, embedder)
            .search(&SearchRequest {
                question: "derby".to_string(),
                domain: Some("cooking".to_string()),
                k: 3,
                time_range: None,
                min_quality: None,
            })
            .await;
        assert!(result.is_err());
    }
}

