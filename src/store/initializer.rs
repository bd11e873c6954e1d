//! Launch-time store bootstrap
//!
//! Opening is fatal on failure. Every later step runs in its own
//! transaction(s); a failing step is recorded in the [`InitReport`] and the
//! remaining steps still run, so the failed step is simply retried in full on
//! the next launch.

use super::{CatalogEntry, ColumnReport, SeedReport, Store, BUILTIN_KEYWORD_CATALOG};
use crate::config::{Config, StoreConfig};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// A migration or seeding step that failed on this launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: String,
    pub error: String,
}

/// What a bootstrap run changed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitReport {
    pub store_path: String,
    pub columns_added: Vec<String>,
    pub backfilled: u64,
    /// Framework keys seeded more than once by older releases
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicate_builtin_keys: Vec<String>,
    pub associations: u64,
    pub seeded: SeedReport,
    pub failures: Vec<StepFailure>,
}

impl InitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// True when the run found nothing left to do
    pub fn is_noop(&self) -> bool {
        self.columns_added.is_empty()
            && self.backfilled == 0
            && self.associations == 0
            && self.seeded.is_empty()
    }
}

/// Opens the store once and brings it up to date
pub struct StoreInitializer {
    path: PathBuf,
    config: StoreConfig,
    catalog: &'static [CatalogEntry],
    store: OnceCell<Store>,
}

impl StoreInitializer {
    pub fn new(path: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self {
            path: path.into(),
            config,
            catalog: BUILTIN_KEYWORD_CATALOG,
            store: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.paths.db_file.clone(), config.store.clone())
    }

    /// Replace the shipped keyword catalog
    pub fn with_catalog(mut self, catalog: &'static [CatalogEntry]) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the store, or return the handle opened by an earlier call
    pub async fn open(&self) -> Result<&Store> {
        self.store
            .get_or_try_init(|| Store::open(&self.path, &self.config))
            .await
    }

    pub async fn migrate_columns(&self) -> Result<ColumnReport> {
        self.open().await?.migrate_columns(self.catalog).await
    }

    pub async fn migrate_associations(&self) -> Result<u64> {
        let batch_size = self.config.migration_batch_size;
        self.open().await?.migrate_associations(batch_size).await
    }

    pub async fn seed_reference_data(&self) -> Result<SeedReport> {
        self.open().await?.seed_reference_data(self.catalog).await
    }

    /// Open the store and run every migration and seeding step in order.
    ///
    /// Only an open failure is returned as an error.
    pub async fn run(&self) -> Result<(Store, InitReport)> {
        let store = self.open().await?.clone();
        let mut report = InitReport {
            store_path: store.path().display().to_string(),
            ..Default::default()
        };

        // Columns first: both later steps write to migrated columns
        if let Some(columns) = run_step(
            &mut report.failures,
            "migrate_columns",
            store.migrate_columns(self.catalog),
        )
        .await
        {
            report.columns_added = columns.added;
            report.backfilled = columns.backfilled;
            report.duplicate_builtin_keys = columns.duplicate_builtin_keys;
        }

        if let Some(count) = run_step(
            &mut report.failures,
            "migrate_associations",
            store.migrate_associations(self.config.migration_batch_size),
        )
        .await
        {
            report.associations = count;
        }

        if let Some(count) =
            run_step(&mut report.failures, "seed_countries", store.seed_countries()).await
        {
            report.seeded.countries = count;
        }
        if let Some(count) =
            run_step(&mut report.failures, "seed_industries", store.seed_industries()).await
        {
            report.seeded.industries = count;
        }
        if let Some(count) =
            run_step(&mut report.failures, "seed_settings", store.seed_settings()).await
        {
            report.seeded.settings = count;
        }
        if let Some(keys) = run_step(
            &mut report.failures,
            "seed_keyword_catalog",
            store.seed_keyword_catalog(self.catalog),
        )
        .await
        {
            report.seeded.keyword_lists = keys;
        }

        if report.is_clean() {
            info!("Store initialized at {}", report.store_path);
        } else {
            warn!(
                "Store initialized with {} failed step(s); they will be retried on next launch",
                report.failures.len()
            );
        }

        Ok((store, report))
    }
}

async fn run_step<T, F>(
    failures: &mut Vec<StepFailure>,
    step: &'static str,
    fut: F,
) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            let err = Error::Migration {
                step,
                reason: e.to_string(),
            };
            warn!("{}", err);
            failures.push(StepFailure {
                step: step.to_string(),
                error: e.to_string(),
            });
            None
        }
    }
}
