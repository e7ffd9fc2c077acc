//! The Sync job: detects and repairs drift between the relational and
//! vector stores left behind by partial failures.
//!
//! Three kinds of drift, handled in order:
//! 1. Orphan vectors — back-pointer resolves to no article claiming
//!    that vector id. Deleted.
//! 2. Dangling article references — an article's vector_id names a
//!    vector that no longer exists. The reference is nulled and the
//!    link demoted to FAILED so it becomes re-crawlable.
//! 3. Half-promoted links — CRAWLED links with no article row at all.
//!    Demoted to FAILED.

use std::sync::Arc;

use anyhow::Result;

use crate::link_store::LinkStore;
use crate::vector::VectorStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub collections_checked: usize,
    pub orphan_vectors_removed: u64,
    pub dangling_references_cleared: u64,
    pub links_demoted: u64,
}

/// Reconcile the given collections (one per active domain).
pub async fn run_sync<L, V>(
    links: &Arc<L>,
    vectors: &Arc<V>,
    collections: &[(String, String)],
) -> Result<SyncReport>
where
    L: LinkStore,
    V: VectorStore,
{
    let mut report = SyncReport::default();

    for (domain, collection) in collections {
        report.collections_checked += 1;

        // 1. Orphan vectors.
        for (vector_id, link_id) in vectors.back_pointers(collection).await? {
            let claimed = links
                .article_by_link(link_id)
                .await?
                .is_some_and(|article| article.vector_id == Some(vector_id));
            if !claimed {
                if vectors.delete(vector_id).await? {
                    tracing::warn!(
                        vector_id = %vector_id,
                        link_id = %link_id,
                        collection = %collection,
                        "Removed orphan vector"
                    );
                    report.orphan_vectors_removed += 1;
                }
            }
        }

        // 2. Dangling article references.
        for article in links.articles_by_domain(domain, i64::MAX).await? {
            let Some(vector_id) = article.vector_id else {
                continue;
            };
            if !vectors.exists(vector_id).await? {
                links.set_article_vector(article.id, None).await?;
                links.demote_to_failed(article.link_id).await?;
                tracing::warn!(
                    article_id = %article.id,
                    link_id = %article.link_id,
                    "Cleared dangling vector reference, link is re-crawlable"
                );
                report.dangling_references_cleared += 1;
            }
        }
    }

    // 3. Half-promoted links (store-wide, not per collection).
    for link_id in links.crawled_missing_article(1_000).await? {
        links.demote_to_failed(link_id).await?;
        tracing::warn!(link_id = %link_id, "Demoted crawled link with no article row");
        report.links_demoted += 1;
    }

    tracing::info!(
        collections = report.collections_checked,
        orphans_removed = report.orphan_vectors_removed,
        dangling_cleared = report.dangling_references_cleared,
        links_demoted = report.links_demoted,
        "Sync pass complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{Embedder, HashEmbedder};
    use crate::link_store::{NewArticle, NewLink};
    use crate::memory::MemoryLinkStore;
    use crate::models::link::LinkState;
    use crate::vector::{ArticleVector, MemoryVectorStore};
    use chrono::Utc;
    use uuid::Uuid;

    const COLLECTION: &str = "news_football_dev";

    fn collections() -> Vec<(String, String)> {
        vec![("football".to_string(), COLLECTION.to_string())]
    }

    fn vector_payload(link_id: Uuid) -> ArticleVector {
        ArticleVector {
            title: "Inter wins the derby".to_string(),
            body: "Inter beat Milan.".to_string(),
            url: "https://s.test/news/derby-1".to_string(),
            source_site: "gazzetta".to_string(),
            domain: "football".to_string(),
            published_date: None,
            extracted_at: Utc::now(),
            quality_score: 0.8,
            keywords: vec![],
            link_id,
        }
    }

    async fn crawled_link(links: &MemoryLinkStore) -> Uuid {
        let site = links
            .upsert_site("s", "S", "https://s.test", "football", true, serde_json::json!({}))
            .await
            .unwrap();
        links
            .insert_links(
                site.id,
                &[NewLink {
                    url: format!("https://s.test/news/{}", Uuid::now_v7()),
                    url_hash: Uuid::now_v7().to_string(),
                    parent_url: None,
                    depth: 0,
                }],
            )
            .await
            .unwrap();
        let link = links.links_in_state(LinkState::New).pop().unwrap();
        links.claim(link.id).await.unwrap();
        links.mark_crawled(link.id, "hash").await.unwrap();
        link.id
    }

    #[tokio::test]
    async fn orphan_vectors_are_deleted() {
        let links = Arc::new(MemoryLinkStore::new());
        let vectors = Arc::new(MemoryVectorStore::new());
        let embedder = HashEmbedder::default();

        // A vector pointing at a link with no article at all.
        let ghost_link = Uuid::now_v7();
        let embedding = embedder.embed("ghost").await.unwrap();
        vectors
            .upsert(COLLECTION, &vector_payload(ghost_link), &embedding)
            .await
            .unwrap();

        let report = run_sync(&links, &vectors, &collections()).await.unwrap();
        assert_eq!(report.orphan_vectors_removed, 1);
        assert_eq!(vectors.count(COLLECTION).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dangling_article_reference_is_cleared_and_link_demoted() {
        let links = Arc::new(MemoryLinkStore::new());
        let vectors = Arc::new(MemoryVectorStore::new());

        let link_id = crawled_link(&links).await;
        let missing_vector = Uuid::now_v7();
        let article = links
            .insert_article(NewArticle {
                link_id,
                vector_id: Some(missing_vector),
                title: "Inter wins the derby".to_string(),
                author: None,
                published_date: None,
                content_length: 100,
                quality_score: 0.8,
                domain: "football".to_string(),
                keywords: vec![],
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        let report = run_sync(&links, &vectors, &collections()).await.unwrap();
        assert_eq!(report.dangling_references_cleared, 1);

        let article = links.article_by_link(link_id).await.unwrap().unwrap();
        assert_eq!(article.vector_id, None);
        let link = links.link_by_id(link_id).await.unwrap().unwrap();
        assert_eq!(link.state, LinkState::Failed);
    }

    #[tokio::test]
    async fn crawled_link_without_article_is_demoted() {
        let links = Arc::new(MemoryLinkStore::new());
        let vectors = Arc::new(MemoryVectorStore::new());

        let link_id = crawled_link(&links).await;

        let report = run_sync(&links, &vectors, &collections()).await.unwrap();
        assert_eq!(report.links_demoted, 1);
        assert_eq!(
            links.link_by_id(link_id).await.unwrap().unwrap().state,
            LinkState::Failed
        );
    }

    #[tokio::test]
    async fn consistent_stores_produce_an_empty_report() {
        let links = Arc::new(MemoryLinkStore::new());
        let vectors = Arc::new(MemoryVectorStore::new());
        let embedder = HashEmbedder::default();

        let link_id = crawled_link(&links).await;
        let embedding = embedder.embed("derby").await.unwrap();
        let vector_id = vectors
            .upsert(COLLECTION, &vector_payload(link_id), &embedding)
            .await
            .unwrap();
        links
            .insert_article(NewArticle {
                link_id,
                vector_id: Some(vector_id),
                title: "Inter wins the derby".to_string(),
                author: None,
                published_date: None,
                content_length: 100,
                quality_score: 0.8,
                domain: "football".to_string(),
                keywords: vec![],
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        let report = run_sync(&links, &vectors, &collections()).await.unwrap();
        assert_eq!(report.orphan_vectors_removed, 0);
        assert_eq!(report.dangling_references_cleared, 0);
        assert_eq!(report.links_demoted, 0);
    }
}
