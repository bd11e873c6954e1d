//! Migrate command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{InitReport, StoreInitializer};
use tracing::info;

/// Run every migration and seeding step against the configured store
pub async fn cmd_migrate(config: &Config) -> Result<InitReport> {
    info!("Migrating store at {:?}", config.paths.db_file);

    let (store, report) = StoreInitializer::from_config(config).run().await?;
    store.close().await;
    Ok(report)
}

/// Print an initializer report to console
pub fn print_init_report(report: &InitReport) {
    println!("Store: {}", report.store_path);

    if report.is_noop() && report.is_clean() && report.duplicate_builtin_keys.is_empty() {
        println!("  Up to date, nothing to migrate");
        return;
    }

    if !report.columns_added.is_empty() {
        println!("  Columns added: {}", report.columns_added.join(", "));
    }
    if report.backfilled > 0 {
        println!("  Keyword lists back-filled: {}", report.backfilled);
    }
    if report.associations > 0 {
        println!("  Project associations migrated: {}", report.associations);
    }
    if !report.duplicate_builtin_keys.is_empty() {
        println!(
            "  ⚠ Duplicate builtin keyword lists: {}",
            report.duplicate_builtin_keys.join(", ")
        );
    }

    let seeded = &report.seeded;
    if seeded.countries > 0 || seeded.industries > 0 || seeded.settings > 0 {
        println!(
            "  Seeded: {} countries, {} industries, {} settings",
            seeded.countries, seeded.industries, seeded.settings
        );
    }
    if !seeded.keyword_lists.is_empty() {
        println!("  Keyword frameworks: {}", seeded.keyword_lists.join(", "));
    }

    for failure in &report.failures {
        println!("  ✗ {} failed: {}", failure.step, failure.error);
    }
    if !report.failures.is_empty() {
        println!("  Failed steps are retried on the next launch.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_migrate_twice() {
        let tmp = TempDir::new().unwrap();
        let config = Config::with_base_dir(tmp.path().to_path_buf());

        let first = cmd_migrate(&config).await.unwrap();
        assert!(first.is_clean());
        assert!(!first.is_noop());
        assert!(config.paths.db_file.exists());

        let second = cmd_migrate(&config).await.unwrap();
        assert!(second.is_noop());
    }
}
