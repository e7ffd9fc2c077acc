//! Extracted article rows, 1:1 with their discovered link.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedArticle {
    pub id: Uuid,
    pub link_id: Uuid,
    /// Paired vector-store object; null marks a record awaiting repair.
    pub vector_id: Option<Uuid>,
    pub title: String,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub content_length: i64,
    pub quality_score: f32,
    pub domain: String,
    /// Domain keywords actually matched in the content.
    pub keywords: Vec<String>,
    pub metadata: serde_json::Value,
    pub extracted_at: DateTime<Utc>,
}

const ARTICLE_COLUMNS: &str = "id, link_id, vector_id, title, author, published_date, \
                               content_length, quality_score, domain, keywords, metadata, extracted_at";

impl ExtractedArticle {
    /// Insert the article for a link, or refresh it on re-crawl (the
    /// relation is 1:1 with discovered links).
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        link_id: Uuid,
        vector_id: Option<Uuid>,
        title: &str,
        author: Option<&str>,
        published_date: Option<DateTime<Utc>>,
        content_length: i64,
        quality_score: f32,
        domain: &str,
        keywords: &[String],
        metadata: serde_json::Value,
        pool: &PgPool,
    ) -> Result<Self> {
        let row = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO extracted_articles
                (id, link_id, vector_id, title, author, published_date,
                 content_length, quality_score, domain, keywords, metadata, extracted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            ON CONFLICT (link_id) DO UPDATE SET
                vector_id = EXCLUDED.vector_id,
                title = EXCLUDED.title,
                author = EXCLUDED.author,
                published_date = EXCLUDED.published_date,
                content_length = EXCLUDED.content_length,
                quality_score = EXCLUDED.quality_score,
                domain = EXCLUDED.domain,
                keywords = EXCLUDED.keywords,
                metadata = EXCLUDED.metadata,
                extracted_at = NOW()
            RETURNING {ARTICLE_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(link_id)
        .bind(vector_id)
        .bind(title)
        .bind(author)
        .bind(published_date)
        .bind(content_length)
        .bind(quality_score)
        .bind(domain)
        .bind(keywords)
        .bind(metadata)
        .fetch_one(pool)
        .await
        .context("Failed to insert extracted article")?;

        Ok(row)
    }

    pub async fn find_by_link(link_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM extracted_articles WHERE link_id = $1"
        ))
        .bind(link_id)
        .fetch_optional(pool)
        .await
        .context("Failed to find article by link")?;

        Ok(row)
    }

    /// Point the article at a (possibly absent) vector object. Setting
    /// null flags the record for the reconciler.
    pub async fn set_vector_id(id: Uuid, vector_id: Option<Uuid>, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE extracted_articles SET vector_id = $2 WHERE id = $1")
            .bind(id)
            .bind(vector_id)
            .execute(pool)
            .await
            .context("Failed to set article vector id")?;

        Ok(())
    }

    pub async fn list_by_domain(domain: &str, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {ARTICLE_COLUMNS}
            FROM extracted_articles
            WHERE domain = $1
            ORDER BY extracted_at DESC
            LIMIT $2
            "#
        ))
        .bind(domain)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list articles by domain")?;

        Ok(rows)
    }

    pub async fn list_recent(since: DateTime<Utc>, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {ARTICLE_COLUMNS}
            FROM extracted_articles
            WHERE extracted_at >= $1
            ORDER BY extracted_at DESC
            LIMIT $2
            "#
        ))
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list recent articles")?;

        Ok(rows)
    }
}
