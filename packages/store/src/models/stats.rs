//! Per-site daily crawl rollups.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStats {
    pub id: Uuid,
    pub site_id: Uuid,
    pub day: NaiveDate,
    pub links_discovered: i64,
    pub links_crawled: i64,
    pub links_failed: i64,
    pub articles_extracted: i64,
    /// Running mean over the articles extracted that day.
    pub avg_quality: Option<f32>,
    pub updated_at: DateTime<Utc>,
}

/// One pass's contribution to a day's rollup.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsDelta {
    pub links_discovered: i64,
    pub links_crawled: i64,
    pub links_failed: i64,
    pub articles_extracted: i64,
    pub quality_sum: f64,
}

impl CrawlStats {
    /// Fold one pass into the (site, day) row, creating it on first
    /// write. The quality mean is recomputed from the stored sum so
    /// repeated passes stay exact.
    pub async fn add(site_id: Uuid, day: NaiveDate, delta: StatsDelta, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawl_stats
                (id, site_id, day, links_discovered, links_crawled, links_failed,
                 articles_extracted, quality_sum, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (site_id, day) DO UPDATE SET
                links_discovered = crawl_stats.links_discovered + EXCLUDED.links_discovered,
                links_crawled = crawl_stats.links_crawled + EXCLUDED.links_crawled,
                links_failed = crawl_stats.links_failed + EXCLUDED.links_failed,
                articles_extracted = crawl_stats.articles_extracted + EXCLUDED.articles_extracted,
                quality_sum = crawl_stats.quality_sum + EXCLUDED.quality_sum,
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(site_id)
        .bind(day)
        .bind(delta.links_discovered)
        .bind(delta.links_crawled)
        .bind(delta.links_failed)
        .bind(delta.articles_extracted)
        .bind(delta.quality_sum)
        .execute(pool)
        .await
        .context("Failed to upsert crawl stats")?;

        Ok(())
    }

    pub async fn since(day: NaiveDate, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, site_id, day, links_discovered, links_crawled, links_failed,
                   articles_extracted,
                   CASE WHEN articles_extracted > 0
                        THEN (quality_sum / articles_extracted)::float4
                   END AS avg_quality,
                   updated_at
            FROM crawl_stats
            WHERE day >= $1
            ORDER BY day DESC, site_id
            "#,
        )
        .bind(day)
        .fetch_all(pool)
        .await
        .context("Failed to read crawl stats")?;

        Ok(rows)
    }
}
