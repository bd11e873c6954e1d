//! Init command implementation

use crate::config::{Config, PathsConfig};
use crate::error::{Error, Result};
use crate::store::{InitReport, StoreInitializer};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use super::print_init_report;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

/// Result of `docsight init`
#[derive(Debug, Clone, Serialize)]
pub struct InitSummary {
    pub config_path: String,
    pub db_path: String,
    pub report: InitReport,
}

/// Write a default configuration and bring the store up
pub async fn cmd_init(options: InitOptions) -> Result<InitSummary> {
    let InitOptions {
        base_dir,
        config_path,
        force,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.paths = PathsConfig {
        db_file: base_dir.join(&config.store.file_name),
        config_file: config_path,
        base_dir,
    };
    config.validate()?;
    config.save()?;

    info!("Initializing store at {:?}", config.paths.db_file);
    let (store, report) = StoreInitializer::from_config(&config).run().await?;
    store.close().await;

    Ok(InitSummary {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        report,
    })
}

/// Print init summary to console
pub fn print_init_summary(summary: &InitSummary) {
    println!("✓ docsight initialized");
    println!("  Config: {}", summary.config_path);
    print_init_report(&summary.report);
    println!("\nNext steps:");
    println!("  docsight status    # Check the store and sidecar");
    println!("  docsight serve     # Start the sidecar and keep it supervised");
}
