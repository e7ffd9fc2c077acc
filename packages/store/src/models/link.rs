//! Discovered links and their lifecycle state machine.
//!
//! All state transitions are single guarded UPDATEs: claiming checks
//! `state = 'new'` (or a re-crawlable terminal state), so concurrent
//! workers can never both own the same link. On startup any link left
//! in `crawling` by a dead process is swept back to `new`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "link_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    New,
    Crawling,
    Crawled,
    Failed,
    Blocked,
    Obsolete,
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredLink {
    pub id: Uuid,
    pub site_id: Uuid,
    pub url: String,
    /// SHA-256 of the canonicalised URL; unique.
    pub url_hash: String,
    /// Page the URL was discovered on, when known.
    pub parent_url: Option<String>,
    /// 0 = seed page.
    pub depth: i32,
    /// SHA-256 of the extracted body, set after a successful crawl.
    pub content_hash: Option<String>,
    pub state: LinkState,
    pub discovered_at: DateTime<Utc>,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub crawl_count: i32,
    pub error_count: i32,
}

const LINK_COLUMNS: &str = "id, site_id, url, url_hash, parent_url, depth, content_hash, state, \
                            discovered_at, last_crawled_at, crawl_count, error_count";

impl DiscoveredLink {
    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(&format!(
            "SELECT {LINK_COLUMNS} FROM discovered_links WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get link")?;

        Ok(row)
    }

    pub async fn find_by_url_hash(url_hash: &str, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(&format!(
            "SELECT {LINK_COLUMNS} FROM discovered_links WHERE url_hash = $1"
        ))
        .bind(url_hash)
        .fetch_optional(pool)
        .await
        .context("Failed to find link by url hash")?;

        Ok(row)
    }

    /// A live link (not obsolete) with this body hash, other than the
    /// one being written. Used for duplicate-content detection.
    pub async fn find_live_by_content_hash(
        content_hash: &str,
        exclude: Uuid,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {LINK_COLUMNS}
            FROM discovered_links
            WHERE content_hash = $1 AND id <> $2 AND state <> 'obsolete'
            ORDER BY discovered_at
            LIMIT 1
            "#
        ))
        .bind(content_hash)
        .bind(exclude)
        .fetch_optional(pool)
        .await
        .context("Failed to find link by content hash")?;

        Ok(row)
    }

    /// NEW links first (oldest discovery first), then CRAWLED links due
    /// for a refresh when a horizon is given. BLOCKED and OBSOLETE are
    /// never returned.
    pub async fn select_crawlable(
        site_id: Uuid,
        limit: i64,
        refresh_older_than: Option<DateTime<Utc>>,
        max_failures: i32,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {LINK_COLUMNS}
            FROM discovered_links
            WHERE site_id = $1
              AND error_count < $2
              AND (
                    state = 'new'
                 OR (state IN ('crawled', 'failed')
                     AND $3::timestamptz IS NOT NULL
                     AND last_crawled_at IS NOT NULL
                     AND last_crawled_at < $3)
              )
            ORDER BY (state <> 'new'), discovered_at
            LIMIT $4
            "#
        ))
        .bind(site_id)
        .bind(max_failures)
        .bind(refresh_older_than)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to select crawlable links")?;

        Ok(rows)
    }

    /// Atomically move a link into CRAWLING. Returns false when another
    /// worker won the claim or the state no longer permits it.
    pub async fn claim(id: Uuid, pool: &PgPool) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE discovered_links
            SET state = 'crawling'
            WHERE id = $1 AND state IN ('new', 'crawled', 'failed')
            "#,
        )
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to claim link")?
        .rows_affected();

        Ok(updated == 1)
    }

    pub async fn mark_crawled(id: Uuid, content_hash: &str, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE discovered_links
            SET state = 'crawled',
                content_hash = $2,
                last_crawled_at = NOW(),
                crawl_count = crawl_count + 1
            WHERE id = $1 AND state = 'crawling'
            "#,
        )
        .bind(id)
        .bind(content_hash)
        .execute(pool)
        .await
        .context("Failed to mark link crawled")?;

        Ok(())
    }

    /// Fail the current attempt. `counts_error` failures grow
    /// `error_count` and promote the link to BLOCKED once the limit is
    /// hit; politeness/off-topic/duplicate failures do not.
    pub async fn mark_failed(
        id: Uuid,
        counts_error: bool,
        max_failures: i32,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE discovered_links
            SET error_count = error_count + $2,
                state = CASE
                    WHEN error_count + $2 >= $3 THEN 'blocked'::link_state
                    ELSE 'failed'::link_state
                END,
                last_crawled_at = NOW(),
                crawl_count = crawl_count + 1
            WHERE id = $1 AND state = 'crawling'
            "#,
        )
        .bind(id)
        .bind(if counts_error { 1i32 } else { 0i32 })
        .bind(max_failures)
        .execute(pool)
        .await
        .context("Failed to mark link failed")?;

        Ok(())
    }

    /// Startup recovery: links abandoned in CRAWLING by a dead process
    /// go back to NEW.
    pub async fn recover_stale(pool: &PgPool) -> Result<u64> {
        let recovered = sqlx::query(
            "UPDATE discovered_links SET state = 'new' WHERE state = 'crawling'",
        )
        .execute(pool)
        .await
        .context("Failed to recover stale links")?
        .rows_affected();

        if recovered > 0 {
            tracing::warn!(recovered = recovered, "Recovered links stuck in crawling state");
        }
        Ok(recovered)
    }

    /// Cleanup: NEW/FAILED links not successfully crawled within the
    /// horizon become OBSOLETE.
    pub async fn sweep_obsolete(older_than: DateTime<Utc>, pool: &PgPool) -> Result<u64> {
        let swept = sqlx::query(
            r#"
            UPDATE discovered_links
            SET state = 'obsolete'
            WHERE state IN ('new', 'failed')
              AND discovered_at < $1
              AND (last_crawled_at IS NULL OR last_crawled_at < $1)
            "#,
        )
        .bind(older_than)
        .execute(pool)
        .await
        .context("Failed to sweep obsolete links")?
        .rows_affected();

        Ok(swept)
    }

    /// Cleanup: bulk-promote repeat offenders that predate the inline
    /// promotion rule.
    pub async fn promote_blocked(max_failures: i32, pool: &PgPool) -> Result<u64> {
        let promoted = sqlx::query(
            r#"
            UPDATE discovered_links
            SET state = 'blocked'
            WHERE state = 'failed' AND error_count >= $1
            "#,
        )
        .bind(max_failures)
        .execute(pool)
        .await
        .context("Failed to promote blocked links")?
        .rows_affected();

        Ok(promoted)
    }

    /// Retention: delete OBSOLETE links past the horizon. Attempts and
    /// article rows go with them via ON DELETE CASCADE.
    pub async fn purge_obsolete(older_than: DateTime<Utc>, pool: &PgPool) -> Result<u64> {
        let purged = sqlx::query(
            "DELETE FROM discovered_links WHERE state = 'obsolete' AND discovered_at < $1",
        )
        .bind(older_than)
        .execute(pool)
        .await
        .context("Failed to purge obsolete links")?
        .rows_affected();

        Ok(purged)
    }

    /// CRAWLED links with no article row; the reconciler demotes them.
    pub async fn crawled_missing_article(limit: i64, pool: &PgPool) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT l.id
            FROM discovered_links l
            LEFT JOIN extracted_articles a ON a.link_id = l.id
            WHERE l.state = 'crawled' AND a.id IS NULL
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list crawled links missing articles")?;

        Ok(ids)
    }

    /// Demote a CRAWLED link back to FAILED (reconciler repair path).
    pub async fn demote_to_failed(id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE discovered_links SET state = 'failed' WHERE id = $1 AND state = 'crawled'")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to demote link")?;

        Ok(())
    }
}
