//! Local persistent store using SQLite
//!
//! This module owns the embedded store the desktop application depends on:
//! - Opening (and creating) the store file with foreign keys and WAL enabled
//! - Applying the additive schema on every launch
//! - One-time migrations keyed on live table metadata
//! - Seeding reference data and builtin keyword frameworks exactly once
//!
//! The [`Store`] handle is constructed once during bootstrap and passed down
//! to consumers; there is no process-wide instance.

mod catalog;
mod initializer;
mod migrate;
mod query;
mod schema;
mod seed;

pub use catalog::*;
pub use initializer::{InitReport, StepFailure, StoreInitializer};
pub use migrate::ColumnReport;
pub use query::ExecOutcome;
pub use schema::*;
pub use seed::SeedReport;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// A named grouping of documents
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A PDF document tracked by the store
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Deprecated single-project reference, superseded by `project_documents`
    pub project_id: Option<String>,
    pub file_path: String,
    pub file_name: String,
    pub title: Option<String>,
    pub analysis_status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn new(file_path: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let file_name = Path::new(&file_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.clone());
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: None,
            file_path,
            file_name,
            title: None,
            analysis_status: "pending".to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A keyword list row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct KeywordList {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_builtin: bool,
    pub framework_key: Option<String>,
    pub category: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row counts and engine settings for status output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub path: String,
    pub journal_mode: String,
    pub foreign_keys: bool,
    pub tables: BTreeMap<String, i64>,
}

/// Store handle; cheap to clone, all clones share one pool
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    path: PathBuf,
}

impl Store {
    /// Open the store at `path`, creating the file and directory if needed,
    /// and apply the schema.
    ///
    /// Any failure here is reported as [`Error::StoreOpen`].
    pub async fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        let store_open = |reason: String| Error::StoreOpen {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| store_open(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        debug!("Opening SQLite store at {:?}", path);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| store_open(e.to_string()))?;

        let store = Self {
            pool,
            path: path.to_path_buf(),
        };
        store
            .apply_schema()
            .await
            .map_err(|e| store_open(e.to_string()))?;

        info!("Store ready at {:?}", path);
        Ok(store)
    }

    /// Apply the conditional schema; safe on every launch
    pub async fn apply_schema(&self) -> Result<()> {
        debug!("Applying store schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the pool, waiting for checked-out connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Whether `table` currently has `column`, read from live table metadata
    pub async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        migrate::has_column(&mut *conn, table, column).await
    }

    // ===== Project / Document Operations =====

    /// Insert a new project
    pub async fn insert_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.created_at)
        .bind(&project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a new document
    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, project_id, file_path, file_name, title, analysis_status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.project_id)
        .bind(&doc.file_path)
        .bind(&doc.file_name)
        .bind(&doc.title)
        .bind(&doc.analysis_status)
        .bind(&doc.created_at)
        .bind(&doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Document ids associated with a project
    pub async fn project_document_ids(&self, project_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar(
            "SELECT document_id FROM project_documents WHERE project_id = ? ORDER BY document_id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Builtin keyword lists, ordered by framework key
    pub async fn builtin_keyword_lists(&self) -> Result<Vec<KeywordList>> {
        let lists = sqlx::query_as::<_, KeywordList>(
            r#"
            SELECT id, name, description, is_builtin, framework_key, category, created_at, updated_at
            FROM keyword_lists
            WHERE is_builtin = 1
            ORDER BY framework_key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(lists)
    }

    // ===== Statistics =====

    /// Row counts for the main tables plus engine settings
    pub async fn stats(&self) -> Result<StoreStats> {
        let mut tables = BTreeMap::new();
        for table in STAT_TABLES {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
            tables.insert(table.to_string(), count);
        }

        let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;
        let foreign_keys: bool = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            path: self.path.display().to_string(),
            journal_mode,
            foreign_keys,
            tables,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_store() -> (Store, TempDir) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("test.db");
        let store = Store::open(&path, &StoreConfig::default()).await.unwrap();
        (store, tmp)
    }

    #[tokio::test]
    async fn test_open_creates_directory_and_file() {
        let (store, tmp) = setup_test_store().await;
        assert!(tmp.path().join("nested").join("test.db").exists());
        assert!(store.column_exists("documents", "project_id").await.unwrap());
        assert!(!store.column_exists("documents", "no_such_column").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_enables_wal_and_foreign_keys() {
        let (store, _tmp) = setup_test_store().await;
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.journal_mode.to_lowercase(), "wal");
        assert!(stats.foreign_keys);
        assert_eq!(stats.tables.get("documents"), Some(&0));
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reopen.db");

        let store = Store::open(&path, &StoreConfig::default()).await.unwrap();
        store.insert_project(&Project::new("Annual reports")).await.unwrap();
        store.close().await;

        let reopened = Store::open(&path, &StoreConfig::default()).await.unwrap();
        let stats = reopened.stats().await.unwrap();
        assert_eq!(stats.tables.get("projects"), Some(&1));
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let (store, _tmp) = setup_test_store().await;
        let mut doc = Document::new("/reports/missing-project.pdf");
        doc.project_id = Some("no-such-project".to_string());
        let err = store.insert_document(&doc).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn test_open_failure_is_store_open_error() {
        let tmp = TempDir::new().unwrap();
        // A directory cannot be opened as a database file
        let err = Store::open(tmp.path(), &StoreConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::StoreOpen { .. }));
        assert!(err.is_fatal());
    }
}
