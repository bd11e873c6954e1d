//! One-time structural migrations
//!
//! Nothing here records a version number. Each migration re-derives what is
//! left to do from the live store (table metadata, missing association rows),
//! so a step interrupted on one launch is completed on the next.

use super::{
    CatalogEntry, Store, BUILTIN_KEY_INDEX_SQL, COLUMN_MIGRATIONS, MIGRATED_INDEXES_SQL,
};
use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

/// Outcome of the additive column migration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnReport {
    /// `table.column` entries added on this run
    pub added: Vec<String>,
    /// Builtin keyword lists tagged with their catalog category
    pub backfilled: u64,
    /// Framework keys held by more than one builtin list. While any remain
    /// the builtin key index is not created.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicate_builtin_keys: Vec<String>,
}

pub(super) async fn has_column(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?) WHERE name = ?)",
    )
    .bind(table)
    .bind(column)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

impl Store {
    /// Add any ledger column the live tables lack, then back-fill
    /// categories on builtin lists seeded before the column existed.
    ///
    /// The builtin framework key index is created here rather than in the
    /// base schema: a store holding duplicate builtin keys must still open,
    /// so the index is skipped (and reported) until they are gone.
    ///
    /// Runs in one transaction; on error nothing from this step persists.
    pub async fn migrate_columns(&self, catalog: &[CatalogEntry]) -> Result<ColumnReport> {
        let mut tx = self.pool.begin().await?;
        let mut report = ColumnReport::default();

        for migration in COLUMN_MIGRATIONS {
            if has_column(&mut *tx, migration.table, migration.column).await? {
                continue;
            }

            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                migration.table, migration.column, migration.definition
            );
            sqlx::query(&sql).execute(&mut *tx).await?;
            info!("Added column {}.{}", migration.table, migration.column);
            report
                .added
                .push(format!("{}.{}", migration.table, migration.column));
        }

        sqlx::query(MIGRATED_INDEXES_SQL).execute(&mut *tx).await?;

        report.duplicate_builtin_keys = sqlx::query_scalar(
            r#"
            SELECT framework_key FROM keyword_lists
            WHERE is_builtin = 1 AND framework_key IS NOT NULL
            GROUP BY framework_key
            HAVING COUNT(*) > 1
            ORDER BY framework_key
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;
        if report.duplicate_builtin_keys.is_empty() {
            sqlx::query(BUILTIN_KEY_INDEX_SQL).execute(&mut *tx).await?;
        } else {
            warn!(
                "Builtin keyword lists share framework keys ({}); unique key index not created",
                report.duplicate_builtin_keys.join(", ")
            );
        }

        // Only rows still lacking a category match, so this never re-fires
        let now = Utc::now().to_rfc3339();
        for entry in catalog {
            let result = sqlx::query(
                r#"
                UPDATE keyword_lists SET category = ?, updated_at = ?
                WHERE is_builtin = 1 AND framework_key = ? AND category IS NULL
                "#,
            )
            .bind(entry.category)
            .bind(&now)
            .bind(entry.key)
            .execute(&mut *tx)
            .await?;
            report.backfilled += result.rows_affected();
        }

        tx.commit().await?;

        if report.backfilled > 0 {
            info!(
                "Back-filled category on {} builtin keyword lists",
                report.backfilled
            );
        }
        Ok(report)
    }

    /// Mirror legacy `documents.project_id` references into
    /// `project_documents`.
    ///
    /// Pending rows are found by the absence of their association row and
    /// are inserted in batches, one transaction per batch. Returns the number
    /// of associations inserted; a repeat run returns zero.
    pub async fn migrate_associations(&self, batch_size: u32) -> Result<u64> {
        let dangling: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM documents d
            WHERE d.project_id IS NOT NULL
              AND NOT EXISTS (SELECT 1 FROM projects p WHERE p.id = d.project_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        if dangling > 0 {
            warn!(
                "Skipping {} documents whose legacy project no longer exists",
                dangling
            );
        }

        let mut inserted = 0u64;
        loop {
            let mut tx = self.pool.begin().await?;

            let pending: Vec<(String, String, String)> = sqlx::query_as(
                r#"
                SELECT d.project_id, d.id, d.created_at
                FROM documents d
                JOIN projects p ON p.id = d.project_id
                WHERE NOT EXISTS (
                    SELECT 1 FROM project_documents pd
                    WHERE pd.project_id = d.project_id AND pd.document_id = d.id
                )
                ORDER BY d.id
                LIMIT ?
                "#,
            )
            .bind(i64::from(batch_size))
            .fetch_all(&mut *tx)
            .await?;

            if pending.is_empty() {
                tx.commit().await?;
                break;
            }

            let batch_len = pending.len();
            for (project_id, document_id, added_at) in pending {
                let result = sqlx::query(
                    r#"
                    INSERT INTO project_documents (project_id, document_id, added_at)
                    VALUES (?, ?, ?)
                    ON CONFLICT(project_id, document_id) DO NOTHING
                    "#,
                )
                .bind(&project_id)
                .bind(&document_id)
                .bind(&added_at)
                .execute(&mut *tx)
                .await?;
                inserted += result.rows_affected();
            }

            tx.commit().await?;
            debug!("Migrated batch of {} project associations", batch_len);

            if batch_len < batch_size as usize {
                break;
            }
        }

        if inserted > 0 {
            info!("Migrated {} legacy project associations", inserted);
        }
        Ok(inserted)
    }
}
