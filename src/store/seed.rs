//! Reference data seeding
//!
//! Each dataset is checked with a cheap predicate before its bulk insert and
//! written in its own transaction. Builtin keyword frameworks are checked and
//! written per catalog entry on the stable framework key, so entries added in
//! a later release are inserted on existing installations without touching
//! the ones seeded before.

use super::{CatalogEntry, Store, COUNTRIES, DEFAULT_SETTINGS, INDUSTRIES};
use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Rows inserted by a seeding pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedReport {
    pub countries: u64,
    pub industries: u64,
    pub settings: u64,
    /// Framework keys of builtin keyword lists inserted on this run
    pub keyword_lists: Vec<String>,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.countries == 0
            && self.industries == 0
            && self.settings == 0
            && self.keyword_lists.is_empty()
    }
}

impl Store {
    /// Seed every reference dataset, stopping at the first failure
    pub async fn seed_reference_data(&self, catalog: &[CatalogEntry]) -> Result<SeedReport> {
        Ok(SeedReport {
            countries: self.seed_countries().await?,
            industries: self.seed_industries().await?,
            settings: self.seed_settings().await?,
            keyword_lists: self.seed_keyword_catalog(catalog).await?,
        })
    }

    /// Insert the country table when it is empty
    pub async fn seed_countries(&self) -> Result<u64> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM countries")
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            debug!("Countries already seeded ({} rows)", existing);
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for (code, name, region) in COUNTRIES {
            inserted += sqlx::query("INSERT INTO countries (code, name, region) VALUES (?, ?, ?)")
                .bind(code)
                .bind(name)
                .bind(region)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        info!("Seeded {} countries", inserted);
        Ok(inserted)
    }

    /// Insert the industry table when it is empty
    pub async fn seed_industries(&self) -> Result<u64> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM industries")
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            debug!("Industries already seeded ({} rows)", existing);
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for (name, sector) in INDUSTRIES {
            inserted += sqlx::query("INSERT INTO industries (name, sector) VALUES (?, ?)")
                .bind(name)
                .bind(sector)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        info!("Seeded {} industries", inserted);
        Ok(inserted)
    }

    /// Insert each default setting whose key is absent; user values are kept
    pub async fn seed_settings(&self) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for (key, value) in DEFAULT_SETTINGS {
            inserted += sqlx::query(
                r#"
                INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
                ON CONFLICT(key) DO NOTHING
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;

        if inserted > 0 {
            info!("Seeded {} default settings", inserted);
        }
        Ok(inserted)
    }

    /// Insert catalog entries with no builtin list for their framework key.
    ///
    /// Each entry is written in its own transaction. A failing entry is
    /// rolled back and logged, the remaining entries are still seeded, and
    /// the first error is returned so the step is retried on the next launch.
    /// Returns the keys inserted on this run.
    pub async fn seed_keyword_catalog(&self, catalog: &[CatalogEntry]) -> Result<Vec<String>> {
        let now = Utc::now().to_rfc3339();
        let mut inserted = Vec::new();
        let mut first_error = None;

        for entry in catalog {
            match self.seed_keyword_entry(entry, &now).await {
                Ok(true) => inserted.push(entry.key.to_string()),
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to seed builtin keyword list '{}': {}", entry.key, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if !inserted.is_empty() {
            info!("Seeded builtin keyword lists: {}", inserted.join(", "));
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(inserted),
        }
    }

    /// Seed one framework with its groups and terms; false if already present
    async fn seed_keyword_entry(&self, entry: &CatalogEntry, now: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let seeded: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM keyword_lists WHERE is_builtin = 1 AND framework_key = ?)",
        )
        .bind(entry.key)
        .fetch_one(&mut *tx)
        .await?;
        if seeded {
            return Ok(false);
        }

        let list_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO keyword_lists (id, name, description, is_builtin, framework_key, category, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?, ?, ?)
            "#,
        )
        .bind(&list_id)
        .bind(entry.name)
        .bind(entry.description)
        .bind(entry.key)
        .bind(entry.category)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (order, group) in entry.groups.iter().enumerate() {
            let category_id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO keyword_categories (id, list_id, name, sort_order) VALUES (?, ?, ?, ?)",
            )
            .bind(&category_id)
            .bind(&list_id)
            .bind(group.name)
            .bind(order as i64)
            .execute(&mut *tx)
            .await?;

            for term in group.terms {
                sqlx::query(
                    "INSERT INTO keywords (id, list_id, category_id, term, created_at) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&list_id)
                .bind(&category_id)
                .bind(term)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        debug!(
            "Seeded builtin keyword list '{}' ({} terms)",
            entry.key,
            entry.term_count()
        );
        Ok(true)
    }
}
