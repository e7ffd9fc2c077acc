//! pgvector-backed vector store. One `article_vectors` table; the
//! collection name is a column, cosine distance via `<=>`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{ArticleVector, VectorHit, VectorStore};

#[derive(Clone)]
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn upsert(
        &self,
        collection: &str,
        article: &ArticleVector,
        embedding: &[f32],
    ) -> Result<Uuid> {
        let vector = Vector::from(embedding.to_vec());

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO article_vectors
                (id, collection, link_id, title, body, url, source_site, domain,
                 published_date, extracted_at, quality_score, keywords, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (collection, link_id) DO UPDATE SET
                title = EXCLUDED.title,
                body = EXCLUDED.body,
                url = EXCLUDED.url,
                source_site = EXCLUDED.source_site,
                published_date = EXCLUDED.published_date,
                extracted_at = EXCLUDED.extracted_at,
                quality_score = EXCLUDED.quality_score,
                keywords = EXCLUDED.keywords,
                embedding = EXCLUDED.embedding
            RETURNING id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(collection)
        .bind(article.link_id)
        .bind(&article.title)
        .bind(&article.body)
        .bind(&article.url)
        .bind(&article.source_site)
        .bind(&article.domain)
        .bind(article.published_date)
        .bind(article.extracted_at)
        .bind(article.quality_score)
        .bind(&article.keywords)
        .bind(vector)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert article vector")?;

        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: i64,
        min_quality: Option<f32>,
    ) -> Result<Vec<VectorHit>> {
        let vector = Vector::from(embedding.to_vec());

        let rows = sqlx::query(
            r#"
            SELECT id, link_id, title, url, domain, source_site, published_date,
                   quality_score, (1 - (embedding <=> $1))::float4 AS similarity
            FROM article_vectors
            WHERE collection = $2
              AND ($3::float4 IS NULL OR quality_score >= $3)
            ORDER BY embedding <=> $1
            LIMIT $4
            "#,
        )
        .bind(vector)
        .bind(collection)
        .bind(min_quality)
        .bind(k)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query article vectors")?;

        Ok(rows
            .into_iter()
            .map(|r| VectorHit {
                id: r.get("id"),
                link_id: r.get("link_id"),
                title: r.get("title"),
                url: r.get("url"),
                domain: r.get("domain"),
                source_site: r.get("source_site"),
                published_date: r.get("published_date"),
                quality_score: r.get("quality_score"),
                similarity: r.get("similarity"),
            })
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM article_vectors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete article vector")?
            .rows_affected();

        Ok(deleted == 1)
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM article_vectors WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check article vector")?;

        Ok(found)
    }

    async fn back_pointers(&self, collection: &str) -> Result<Vec<(Uuid, Uuid)>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT id, link_id FROM article_vectors WHERE collection = $1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list vector back-pointers")?;

        Ok(rows)
    }

    async fn count(&self, collection: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM article_vectors WHERE collection = $1",
        )
        .bind(collection)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count article vectors")?;

        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        // Must touch the vector table itself: a bare SELECT 1 cannot
        // see a missing extension or a dropped article_vectors.
        sqlx::query("SELECT 1 FROM article_vectors LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Vector collection probe failed")?;
        Ok(())
    }
}
