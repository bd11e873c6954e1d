//! Status command implementation

use crate::config::{Config, SidecarMode};
use crate::error::Result;
use crate::sidecar::{BinaryLocator, LaunchTarget, Supervisor};
use crate::store::{Store, StoreStats};
use serde::Serialize;
use tracing::{debug, info};

/// Sidecar half of the status report
#[derive(Debug, Clone, Serialize)]
pub struct SidecarInfo {
    pub mode: SidecarMode,
    pub url: String,
    /// Bundled binary, when one was found
    pub binary: Option<String>,
    /// Result of a live probe
    pub reachable: bool,
}

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub store: StoreStats,
    pub sidecar: SidecarInfo,
}

/// Get system status
pub async fn cmd_status(config: &Config) -> Result<StatusInfo> {
    info!("Getting status");

    let store = Store::open(&config.paths.db_file, &config.store).await?;
    let stats = store.stats().await?;
    store.close().await;

    let locator = BinaryLocator::from_config(&config.sidecar);
    let binary = match locator.locate() {
        Ok(LaunchTarget::Embedded(path)) => Some(path.display().to_string()),
        Ok(LaunchTarget::External) => None,
        Err(e) => {
            debug!("Sidecar binary lookup: {}", e);
            None
        }
    };

    let supervisor = Supervisor::builder(&config.sidecar)
        .locator(locator)
        .build()?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        store: stats,
        sidecar: SidecarInfo {
            mode: supervisor.mode(),
            url: supervisor.get_url(),
            binary,
            reachable: supervisor.is_running().await,
        },
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 docsight Status\n");
    println!("Configuration: {}", status.config_path);

    println!("\nStore: {}", status.store.path);
    println!("  Journal mode: {}", status.store.journal_mode);
    println!(
        "  Foreign keys: {}",
        if status.store.foreign_keys { "on" } else { "off" }
    );
    for (table, count) in &status.store.tables {
        println!("  {}: {}", table, count);
    }

    let sidecar = &status.sidecar;
    println!("\nSidecar:");
    println!("  Mode: {:?}", sidecar.mode);
    println!("  URL: {}", sidecar.url);
    if let Some(binary) = &sidecar.binary {
        println!("  Binary: {}", binary);
    } else if sidecar.mode == SidecarMode::Packaged {
        println!("  Binary: ✗ not found");
    }
    let reachable = if sidecar.reachable {
        "✓ Healthy"
    } else {
        "✗ Not reachable (offline mode)"
    };
    println!("  Status: {}", reachable);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_status_probes_development_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut config = Config::with_base_dir(tmp.path().to_path_buf());
        config.sidecar.mode = SidecarMode::Development;
        config.sidecar.host = "127.0.0.1".to_string();
        config.sidecar.dev_port = server.address().port();

        let status = cmd_status(&config).await.unwrap();
        assert!(status.sidecar.reachable);
        assert_eq!(status.sidecar.url, server.uri());
        assert_eq!(status.sidecar.binary, None);
        assert_eq!(status.store.tables.get("projects"), Some(&0));
    }

    #[tokio::test]
    async fn test_status_reports_unreachable_sidecar() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::with_base_dir(tmp.path().to_path_buf());
        config.sidecar.mode = SidecarMode::Development;
        config.sidecar.host = "127.0.0.1".to_string();
        // Nothing listens on the discard port
        config.sidecar.dev_port = 9;
        config.sidecar.probe_timeout_ms = 200;

        let status = cmd_status(&config).await.unwrap();
        assert!(!status.sidecar.reachable);
    }
}
