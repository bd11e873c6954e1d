//! Serve command implementation

use crate::bootstrap::{bootstrap, App, SidecarStartup};
use crate::config::Config;
use crate::error::Result;
use crate::sidecar::{Liveness, StopOutcome};
use tracing::{info, warn};

/// Bootstrap the store and sidecar for a long-running session
pub async fn cmd_serve(config: &Config) -> Result<App> {
    info!("Starting docsight");
    bootstrap(config).await
}

/// Log liveness changes until Ctrl-C, then shut down
pub async fn run_until_shutdown(app: App) -> Result<StopOutcome> {
    let mut liveness = app.supervisor.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                info!("Shutdown requested");
                break;
            }
            changed = liveness.changed() => {
                if changed.is_err() {
                    break;
                }
                match *liveness.borrow_and_update() {
                    Liveness::Unhealthy => warn!("Sidecar is unhealthy"),
                    Liveness::Stopped => warn!("Sidecar exited; running in offline mode"),
                    state => info!("Sidecar is {:?}", state),
                }
            }
        }
    }

    app.shutdown().await
}

/// Print startup state to console
pub fn print_startup(app: &App) {
    println!("✓ Store ready: {}", app.init.store_path);
    match &app.sidecar {
        SidecarStartup::Ready(status) => {
            let url = status.url.as_deref().unwrap_or("unknown");
            match status.pid {
                Some(pid) => println!("✓ Sidecar running at {} (pid {})", url, pid),
                None => println!("✓ Sidecar expected at {} (external)", url),
            }
        }
        SidecarStartup::Offline { reason } => {
            println!("⚠ Offline mode: {}", reason);
        }
    }
    println!("Press Ctrl-C to stop.");
}

/// Print how the sidecar stopped
pub fn print_stop_outcome(outcome: &StopOutcome) {
    match outcome {
        StopOutcome::NotRunning => println!("✓ Stopped"),
        StopOutcome::Graceful { exit } => println!("✓ Sidecar stopped ({})", exit),
        StopOutcome::Forced { exit } => println!("⚠ Sidecar killed after grace period ({})", exit),
    }
}
