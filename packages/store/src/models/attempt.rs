//! Append-only crawl attempt history. Rows are never updated; the only
//! delete is the retention sweep.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct CrawlAttempt {
    pub id: Uuid,
    pub link_id: Uuid,
    pub attempted_at: DateTime<Utc>,
    pub success: bool,
    pub response_time_ms: Option<i64>,
    pub content_length: Option<i64>,
    pub error_message: Option<String>,
}

impl CrawlAttempt {
    pub async fn record(
        link_id: Uuid,
        success: bool,
        response_time_ms: Option<i64>,
        content_length: Option<i64>,
        error_message: Option<&str>,
        pool: &PgPool,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO crawl_attempts (id, link_id, attempted_at, success, response_time_ms, content_length, error_message)
            VALUES ($1, $2, NOW(), $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(link_id)
        .bind(success)
        .bind(response_time_ms)
        .bind(content_length)
        .bind(error_message)
        .execute(pool)
        .await
        .context("Failed to record crawl attempt")?;

        Ok(id)
    }

    pub async fn list_for_link(link_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, link_id, attempted_at, success, response_time_ms, content_length, error_message
            FROM crawl_attempts
            WHERE link_id = $1
            ORDER BY attempted_at
            "#,
        )
        .bind(link_id)
        .fetch_all(pool)
        .await
        .context("Failed to list crawl attempts")?;

        Ok(rows)
    }

    /// Retention sweep; the one sanctioned delete on this table.
    pub async fn prune(older_than: DateTime<Utc>, pool: &PgPool) -> Result<u64> {
        let pruned = sqlx::query("DELETE FROM crawl_attempts WHERE attempted_at < $1")
            .bind(older_than)
            .execute(pool)
            .await
            .context("Failed to prune crawl attempts")?
            .rows_affected();

        Ok(pruned)
    }
}
