//! The vector-store contract. One backend ships (pgvector); the
//! in-memory implementation exists for tests and local development.
//!
//! A "collection" is a namespace of the form `<prefix>_<domain>_<env>`;
//! queries never cross collections.

pub mod memory;
pub mod pg;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryVectorStore;
pub use pg::PgVectorStore;

/// Searchable article payload stored beside the embedding.
#[derive(Debug, Clone)]
pub struct ArticleVector {
    pub title: String,
    pub body: String,
    pub url: String,
    pub source_site: String,
    pub domain: String,
    pub published_date: Option<DateTime<Utc>>,
    pub extracted_at: DateTime<Utc>,
    pub quality_score: f32,
    pub keywords: Vec<String>,
    /// Back-pointer to the relational link row. Soft reference: the
    /// reconciler removes vectors whose pointer no longer resolves.
    pub link_id: Uuid,
}

/// One nearest-neighbour hit. `similarity` is 1 − cosine distance, so
/// higher is closer.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: Uuid,
    pub link_id: Uuid,
    pub title: String,
    pub url: String,
    pub domain: String,
    pub source_site: String,
    pub published_date: Option<DateTime<Utc>>,
    pub quality_score: f32,
    pub similarity: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or refresh the article for its link within a collection.
    /// Returns the vector-object id.
    async fn upsert(
        &self,
        collection: &str,
        article: &ArticleVector,
        embedding: &[f32],
    ) -> Result<Uuid>;

    /// Top-k nearest neighbours, optionally gated by a minimum quality
    /// score.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: i64,
        min_quality: Option<f32>,
    ) -> Result<Vec<VectorHit>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn exists(&self, id: Uuid) -> Result<bool>;

    /// (vector id, link id) pairs for a collection; the reconciler
    /// walks these to find orphans.
    async fn back_pointers(&self, collection: &str) -> Result<Vec<(Uuid, Uuid)>>;

    async fn count(&self, collection: &str) -> Result<i64>;

    /// Collection probe for the health surface. Implementations must
    /// exercise the vector data itself, not just the connection.
    async fn ping(&self) -> Result<()>;
}

/// Cosine similarity between two equal-length vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
