//! Application bootstrap and shutdown
//!
//! Store first: failing to open it halts startup. The sidecar comes second
//! and any failure there leaves the application running in offline mode.

use crate::config::Config;
use crate::error::Result;
use crate::sidecar::{SidecarStatus, StopOutcome, Supervisor};
use crate::store::{InitReport, Store, StoreInitializer};
use serde::Serialize;
use tracing::{info, warn};

/// Whether the sidecar came up during bootstrap
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SidecarStartup {
    Ready(SidecarStatus),
    /// Sidecar-dependent features are unavailable
    Offline { reason: String },
}

impl SidecarStartup {
    pub fn is_offline(&self) -> bool {
        matches!(self, SidecarStartup::Offline { .. })
    }
}

/// Handles owned by the running application
pub struct App {
    pub store: Store,
    pub supervisor: Supervisor,
    pub init: InitReport,
    pub sidecar: SidecarStartup,
}

/// Bring up the store and then the sidecar
pub async fn bootstrap(config: &Config) -> Result<App> {
    let (store, init) = StoreInitializer::from_config(config).run().await?;

    let supervisor = Supervisor::new(&config.sidecar)?;
    let sidecar = match supervisor.start().await {
        Ok(status) => SidecarStartup::Ready(status),
        Err(e) => {
            warn!("Sidecar unavailable, continuing in offline mode: {}", e);
            SidecarStartup::Offline {
                reason: e.to_string(),
            }
        }
    };

    Ok(App {
        store,
        supervisor,
        init,
        sidecar,
    })
}

impl App {
    /// Stop the sidecar and close the store
    pub async fn shutdown(self) -> Result<StopOutcome> {
        let outcome = self.supervisor.stop().await?;
        info!("Sidecar stopped: {:?}", outcome);
        self.store.close().await;
        Ok(outcome)
    }
}
