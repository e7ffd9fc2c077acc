//! In-memory vector store: brute-force cosine search over a HashMap.
//! Tests and local development only.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::{cosine_similarity, ArticleVector, VectorHit, VectorStore};

struct Entry {
    collection: String,
    article: ArticleVector,
    embedding: Vec<f32>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    entries: RwLock<HashMap<Uuid, Entry>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(
        &self,
        collection: &str,
        article: &ArticleVector,
        embedding: &[f32],
    ) -> Result<Uuid> {
        let mut entries = self.entries.write().unwrap();

        let existing = entries
            .iter()
            .find(|(_, e)| e.collection == collection && e.article.link_id == article.link_id)
            .map(|(id, _)| *id);
        let id = existing.unwrap_or_else(Uuid::now_v7);

        entries.insert(
            id,
            Entry {
                collection: collection.to_string(),
                article: article.clone(),
                embedding: embedding.to_vec(),
            },
        );
        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: i64,
        min_quality: Option<f32>,
    ) -> Result<Vec<VectorHit>> {
        let entries = self.entries.read().unwrap();

        let mut hits: Vec<VectorHit> = entries
            .iter()
            .filter(|(_, e)| e.collection == collection)
            .filter(|(_, e)| min_quality.is_none_or(|q| e.article.quality_score >= q))
            .map(|(id, e)| VectorHit {
                id: *id,
                link_id: e.article.link_id,
                title: e.article.title.clone(),
                url: e.article.url.clone(),
                domain: e.article.domain.clone(),
                source_site: e.article.source_site.clone(),
                published_date: e.article.published_date,
                quality_score: e.article.quality_score,
                similarity: cosine_similarity(embedding, &e.embedding),
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k as usize);
        Ok(hits)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.entries.write().unwrap().remove(&id).is_some())
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.entries.read().unwrap().contains_key(&id))
    }

    async fn back_pointers(&self, collection: &str) -> Result<Vec<(Uuid, Uuid)>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|(_, e)| e.collection == collection)
            .map(|(id, e)| (*id, e.article.link_id))
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<i64> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .values()
            .filter(|e| e.collection == collection)
            .count() as i64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(link_id: Uuid, title: &str, quality: f32) -> ArticleVector {
        ArticleVector {
            title: title.to_string(),
            body: format!("{title} body"),
            url: format!("https://s.test/news/{}", title.replace(' ', "-")),
            source_site: "gazzetta".to_string(),
            domain: "football".to_string(),
            published_date: None,
            extracted_at: Utc::now(),
            quality_score: quality,
            keywords: vec![],
            link_id,
        }
    }

    #[tokio::test]
    async fn query_ranks_by_similarity_within_the_collection() {
        let store = MemoryVectorStore::new();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let c = Uuid::now_v7();

        store
            .upsert("news_football_dev", &article(a, "derby", 0.9), &[1.0, 0.0])
            .await
            .unwrap();
        store
            .upsert("news_football_dev", &article(b, "transfer", 0.9), &[0.6, 0.8])
            .await
            .unwrap();
        store
            .upsert("news_tech_dev", &article(c, "gadgets", 0.9), &[1.0, 0.0])
            .await
            .unwrap();

        let hits = store
            .query("news_football_dev", &[1.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].link_id, a);
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn min_quality_filters_hits() {
        let store = MemoryVectorStore::new();
        store
            .upsert("c", &article(Uuid::now_v7(), "good", 0.9), &[1.0])
            .await
            .unwrap();
        store
            .upsert("c", &article(Uuid::now_v7(), "poor", 0.2), &[1.0])
            .await
            .unwrap();

        let hits = store.query("c", &[1.0], 10, Some(0.5)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "good");
    }

    #[tokio::test]
    async fn upsert_replaces_the_same_link_in_a_collection() {
        let store = MemoryVectorStore::new();
        let link_id = Uuid::now_v7();

        let first = store
            .upsert("c", &article(link_id, "v1", 0.5), &[1.0])
            .await
            .unwrap();
        let second = store
            .upsert("c", &article(link_id, "v2", 0.6), &[0.9])
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_and_exists_agree() {
        let store = MemoryVectorStore::new();
        let id = store
            .upsert("c", &article(Uuid::now_v7(), "derby", 0.9), &[1.0])
            .await
            .unwrap();

        assert!(store.exists(id).await.unwrap());
        assert!(store.delete(id).await.unwrap());
        assert!(!store.exists(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
    }
}
