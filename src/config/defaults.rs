//! Default values for configuration

use super::SidecarMode;

/// Default sidecar bind host, overridable with DOCSIGHT_SIDECAR_HOST
pub fn default_sidecar_host() -> String {
    std::env::var("DOCSIGHT_SIDECAR_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Default sidecar port, overridable with DOCSIGHT_SIDECAR_PORT
pub fn default_sidecar_port() -> u16 {
    std::env::var("DOCSIGHT_SIDECAR_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8765)
}

/// Port an externally-run development server listens on
pub fn default_sidecar_dev_port() -> u16 {
    8000
}

/// Default sidecar resolution mode
pub fn default_sidecar_mode() -> SidecarMode {
    SidecarMode::Auto
}

/// Default sidecar executable name (platform suffix is appended at lookup)
pub fn default_sidecar_binary_name() -> String {
    "docsight-analysis".to_string()
}

/// Overall budget for the sidecar to report healthy after spawn
pub fn default_startup_timeout_ms() -> u64 {
    30_000
}

/// Delay before the first readiness probe, while the server binds
pub fn default_startup_grace_ms() -> u64 {
    1_500
}

/// Delay between readiness probes
pub fn default_retry_interval_ms() -> u64 {
    500
}

/// Timeout for a single health probe
pub fn default_probe_timeout_ms() -> u64 {
    2_000
}

/// Interval between steady-state health checks
pub fn default_monitor_interval_secs() -> u64 {
    30
}

/// Time allowed for a graceful exit before the process is killed
pub fn default_stop_grace_ms() -> u64 {
    5_000
}

/// Liveness endpoint path
pub fn default_health_path() -> String {
    "/health".to_string()
}

/// Default store file name inside the base directory
pub fn default_store_file_name() -> String {
    "docsight.db".to_string()
}

/// Default pool size for the store
pub fn default_store_max_connections() -> u32 {
    5
}

/// Default SQLite busy timeout
pub fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

/// Rows migrated per association-migration transaction
pub fn default_migration_batch_size() -> u32 {
    500
}
