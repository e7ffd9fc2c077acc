//! Site rows: one per configured news site, created on first
//! encounter, config refreshed on every crawl pass, deactivated but
//! never deleted.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct SiteRow {
    pub id: Uuid,
    /// Registry identifier (config key), unique.
    pub site_key: String,
    pub name: String,
    pub base_url: String,
    pub domain: String,
    pub active: bool,
    /// Opaque snapshot of the registry config for this site.
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteRow {
    /// Create the row on first encounter, refresh the mutable fields
    /// otherwise.
    pub async fn upsert(
        site_key: &str,
        name: &str,
        base_url: &str,
        domain: &str,
        active: bool,
        config: serde_json::Value,
        pool: &PgPool,
    ) -> Result<Self> {
        let row = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO sites (id, site_key, name, base_url, domain, active, config, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            ON CONFLICT (site_key) DO UPDATE SET
                name = EXCLUDED.name,
                base_url = EXCLUDED.base_url,
                domain = EXCLUDED.domain,
                active = EXCLUDED.active,
                config = EXCLUDED.config,
                updated_at = NOW()
            RETURNING id, site_key, name, base_url, domain, active, config, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(site_key)
        .bind(name)
        .bind(base_url)
        .bind(domain)
        .bind(active)
        .bind(config)
        .fetch_one(pool)
        .await
        .context("Failed to upsert site")?;

        Ok(row)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, site_key, name, base_url, domain, active, config, created_at, updated_at
            FROM sites
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get site")?;

        Ok(row)
    }

    pub async fn find_by_key(site_key: &str, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, site_key, name, base_url, domain, active, config, created_at, updated_at
            FROM sites
            WHERE site_key = $1
            "#,
        )
        .bind(site_key)
        .fetch_optional(pool)
        .await
        .context("Failed to find site by key")?;

        Ok(row)
    }

    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, site_key, name, base_url, domain, active, config, created_at, updated_at
            FROM sites
            WHERE active = true
            ORDER BY site_key
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to list active sites")?;

        Ok(rows)
    }
}
