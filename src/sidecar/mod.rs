//! Sidecar process supervision
//!
//! The [`Supervisor`] owns at most one sidecar process. It locates the
//! bundled binary, spawns it, waits for the liveness endpoint to answer,
//! monitors it on an interval and stops it with a grace period before
//! killing it. Process exit is observed by a watcher task that clears the
//! tracked handle, so a crashed sidecar can simply be started again.

mod locate;
mod monitor;
mod probe;
mod process;

pub use locate::{ensure_executable, BinaryLocator, LaunchTarget};
pub use monitor::{HealthObserver, HealthReport, HealthTracker, LogOnlyObserver};
pub use probe::{wait_for_ready, HealthProbe, HttpHealthProbe, ReadinessPolicy};
pub use process::OUTPUT_TARGET;

use crate::config::{SidecarConfig, SidecarMode};
use crate::error::{Error, Result};
use process::ExitReceiver;
use serde::Serialize;
use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Liveness of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Unknown,
    Starting,
    Healthy,
    Unhealthy,
    Stopped,
}

/// Snapshot returned by [`Supervisor::get_status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidecarStatus {
    pub running: bool,
    pub url: Option<String>,
    pub pid: Option<u32>,
}

/// How [`Supervisor::stop`] ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum StopOutcome {
    /// No process was tracked
    NotRunning,
    /// Exited within the grace period
    Graceful { exit: String },
    /// Killed after the grace period, or directly where signals are unsupported
    Forced { exit: String },
}

/// The tracked process
struct Running {
    generation: u64,
    pid: Option<u32>,
    kill: Option<oneshot::Sender<()>>,
    exit: ExitReceiver,
    monitor: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct State {
    generation: u64,
    running: Option<Running>,
}

struct Inner {
    config: SidecarConfig,
    mode: SidecarMode,
    port: u16,
    url: String,
    locator: BinaryLocator,
    probe: Arc<dyn HealthProbe>,
    observer: Arc<dyn HealthObserver>,
    state: Mutex<State>,
    liveness: watch::Sender<Liveness>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a liveness change only if `generation` is still the tracked process
    fn set_liveness_for(&self, generation: u64, liveness: Liveness) -> bool {
        let state = self.lock();
        let current = state
            .running
            .as_ref()
            .is_some_and(|running| running.generation == generation);
        if current {
            self.liveness.send_replace(liveness);
        }
        current
    }

    /// Called by the exit watcher once the process has been reaped
    fn on_exit(&self, generation: u64, description: &str) {
        let mut state = self.lock();
        let current = state
            .running
            .as_ref()
            .is_some_and(|running| running.generation == generation);
        if !current {
            return;
        }

        if let Some(running) = state.running.take() {
            if let Some(monitor) = running.monitor {
                monitor.abort();
            }
            info!(
                "Sidecar (pid {}) exited: {}",
                running.pid.unwrap_or_default(),
                description
            );
        }
        self.liveness.send_replace(Liveness::Stopped);
    }
}

/// Build the base URL for `host:port`, bracketing IPv6 literals
pub fn base_url(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("http://[{}]:{}", host, port)
    } else {
        format!("http://{}:{}", host, port)
    }
}

/// Builder for [`Supervisor`], for replacing the probe, observer or locator
pub struct SupervisorBuilder {
    config: SidecarConfig,
    locator: Option<BinaryLocator>,
    probe: Option<Arc<dyn HealthProbe>>,
    observer: Option<Arc<dyn HealthObserver>>,
}

impl SupervisorBuilder {
    pub fn locator(mut self, locator: BinaryLocator) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Receives every steady-state health report; the restart-policy seam
    pub fn observer(mut self, observer: Arc<dyn HealthObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<Supervisor> {
        let locator = self
            .locator
            .unwrap_or_else(|| BinaryLocator::from_config(&self.config));
        let mode = locator.resolve_mode();
        let port = match mode {
            SidecarMode::Development => self.config.dev_port,
            _ => self.config.port,
        };
        let url = base_url(&self.config.host, port);

        let probe: Arc<dyn HealthProbe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpHealthProbe::new(&url, &self.config.health_path)?),
        };
        let observer: Arc<dyn HealthObserver> = match self.observer {
            Some(observer) => observer,
            None => Arc::new(LogOnlyObserver),
        };

        debug!("Sidecar supervisor in {:?} mode at {}", mode, url);

        let (liveness, _) = watch::channel(Liveness::Unknown);
        Ok(Supervisor {
            inner: Arc::new(Inner {
                config: self.config,
                mode,
                port,
                url,
                locator,
                probe,
                observer,
                state: Mutex::new(State::default()),
                liveness,
            }),
        })
    }
}

/// Supervises one sidecar process; clones share the same process
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(config: &SidecarConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: &SidecarConfig) -> SupervisorBuilder {
        SupervisorBuilder {
            config: config.clone(),
            locator: None,
            probe: None,
            observer: None,
        }
    }

    /// Mode after resolving `auto`
    pub fn mode(&self) -> SidecarMode {
        self.inner.mode
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// Base URL of the sidecar; no I/O
    pub fn get_url(&self) -> String {
        self.inner.url.clone()
    }

    /// Current liveness as last observed
    pub fn liveness(&self) -> Liveness {
        *self.inner.liveness.borrow()
    }

    /// Liveness changes, for UI indicators
    pub fn subscribe(&self) -> watch::Receiver<Liveness> {
        self.inner.liveness.subscribe()
    }

    /// Cached status; no I/O.
    ///
    /// In development mode the external server is assumed to be running.
    pub fn get_status(&self) -> SidecarStatus {
        if self.inner.mode == SidecarMode::Development {
            return SidecarStatus {
                running: true,
                url: Some(self.get_url()),
                pid: None,
            };
        }

        let state = self.inner.lock();
        match &state.running {
            Some(running) => SidecarStatus {
                running: true,
                url: Some(self.get_url()),
                pid: running.pid,
            },
            None => SidecarStatus {
                running: false,
                url: None,
                pid: None,
            },
        }
    }

    /// One live probe; any error or timeout reports `false`
    pub async fn is_running(&self) -> bool {
        self.inner
            .probe
            .check(self.inner.config.probe_timeout())
            .await
            .is_ok()
    }

    /// Start the sidecar and wait until it reports healthy.
    ///
    /// Returns the current status without spawning when a process is
    /// already tracked. On [`Error::StartupTimeout`] the spawned process is
    /// left running, tracked as unhealthy and monitored like a ready one.
    pub async fn start(&self) -> Result<SidecarStatus> {
        let inner = &self.inner;

        if inner.mode == SidecarMode::Development {
            info!(
                "Development mode: expecting an external sidecar at {}",
                inner.url
            );
            return Ok(self.get_status());
        }

        let (generation, exit) = {
            let mut state = inner.lock();
            if state.running.is_some() {
                debug!("Sidecar already running");
                drop(state);
                return Ok(self.get_status());
            }

            let path = match inner.locator.locate()? {
                LaunchTarget::Embedded(path) => path,
                LaunchTarget::External => {
                    return Err(Error::Other(
                        "sidecar resolved to an external server in packaged mode".to_string(),
                    ))
                }
            };

            ensure_executable(&path)?;
            info!("Starting sidecar {:?} on {}", path, inner.url);
            let mut child = process::spawn(&path, &inner.config.host, inner.port)?;
            let pid = child.id();
            if let Some(pid) = pid {
                process::pump_output(&mut child, pid);
            }

            state.generation += 1;
            let generation = state.generation;
            let (kill_tx, kill_rx) = oneshot::channel();
            let weak: Weak<Inner> = Arc::downgrade(inner);
            let exit = process::watch_exit(child, kill_rx, move |description| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_exit(generation, description);
                }
            });

            state.running = Some(Running {
                generation,
                pid,
                kill: Some(kill_tx),
                exit: exit.clone(),
                monitor: None,
            });
            inner.liveness.send_replace(Liveness::Starting);
            (generation, exit)
        };

        let policy = ReadinessPolicy::from_config(&inner.config);
        let ready = tokio::select! {
            result = wait_for_ready(inner.probe.as_ref(), &policy) => result,
            description = process::wait_for_exit(exit) => Err(Error::SidecarExited(description)),
        };

        if let Err(e) = ready {
            // A slow sidecar stays tracked; the monitor can still see it recover
            if matches!(e, Error::StartupTimeout { .. })
                && inner.set_liveness_for(generation, Liveness::Unhealthy)
            {
                self.spawn_monitor(generation);
            }
            warn!("Sidecar failed to start: {}", e);
            return Err(e);
        }

        if inner.set_liveness_for(generation, Liveness::Healthy) {
            self.spawn_monitor(generation);
            info!("Sidecar ready at {}", inner.url);
        }
        Ok(self.get_status())
    }

    fn spawn_monitor(&self, generation: u64) {
        let weak = Arc::downgrade(&self.inner);
        let handle = monitor::spawn_monitor(
            self.inner.probe.clone(),
            self.inner.observer.clone(),
            self.inner.config.monitor_interval(),
            self.inner.config.probe_timeout(),
            move |report| {
                let liveness = if report.healthy {
                    Liveness::Healthy
                } else {
                    Liveness::Unhealthy
                };
                weak.upgrade()
                    .is_some_and(|inner| inner.set_liveness_for(generation, liveness))
            },
        );

        let mut state = self.inner.lock();
        match state.running.as_mut() {
            Some(running) if running.generation == generation => {
                running.monitor = Some(handle);
            }
            _ => handle.abort(),
        }
    }

    /// Stop the sidecar: terminate gracefully, kill after the grace period.
    ///
    /// Resolves only once the process has exited. Safe to call repeatedly
    /// and before or during [`Supervisor::start`].
    pub async fn stop(&self) -> Result<StopOutcome> {
        let inner = &self.inner;

        let (pid, kill, exit) = {
            let mut state = inner.lock();
            let Some(running) = state.running.as_mut() else {
                debug!("Stop requested with no sidecar running");
                return Ok(StopOutcome::NotRunning);
            };
            if let Some(monitor) = running.monitor.take() {
                monitor.abort();
            }
            (running.pid, running.kill.take(), running.exit.clone())
        };

        let grace = inner.config.stop_grace();
        let signalled = match pid {
            Some(pid) => match process::request_termination(pid) {
                Ok(()) => true,
                Err(e) => {
                    debug!("Graceful termination unavailable: {}", e);
                    false
                }
            },
            None => false,
        };

        if signalled {
            info!("Stopping sidecar (pid {:?})", pid);
            match tokio::time::timeout(grace, process::wait_for_exit(exit.clone())).await {
                Ok(description) => return Ok(StopOutcome::Graceful { exit: description }),
                Err(_) => warn!(
                    "Sidecar did not exit within {}ms, killing it",
                    grace.as_millis()
                ),
            }
        }

        if let Some(kill) = kill {
            let _ = kill.send(());
        }
        let description = process::wait_for_exit(exit).await;
        Ok(StopOutcome::Forced { exit: description })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("sidecar.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn health_server(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    /// Packaged-mode config probing `server` and launching `binary`
    fn packaged(server: &MockServer, binary: PathBuf) -> SidecarConfig {
        SidecarConfig {
            mode: SidecarMode::Packaged,
            host: "127.0.0.1".to_string(),
            port: server.address().port(),
            binary_path: Some(binary),
            startup_timeout_ms: 2_000,
            startup_grace_ms: 20,
            retry_interval_ms: 50,
            probe_timeout_ms: 200,
            stop_grace_ms: 300,
            ..Default::default()
        }
    }

    async fn wait_until_stopped(supervisor: &Supervisor) {
        let mut liveness = supervisor.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            liveness.wait_for(|l| *l == Liveness::Stopped),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[test]
    fn test_base_url_formats() {
        assert_eq!(base_url("127.0.0.1", 8765), "http://127.0.0.1:8765");
        assert_eq!(base_url("localhost", 1), "http://localhost:1");
        assert_eq!(base_url("::1", 9000), "http://[::1]:9000");
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let config = SidecarConfig {
            mode: SidecarMode::Packaged,
            ..Default::default()
        };
        let supervisor = Supervisor::new(&config).unwrap();

        let started = Instant::now();
        assert_eq!(supervisor.stop().await.unwrap(), StopOutcome::NotRunning);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(supervisor.get_url(), base_url(&config.host, config.port));
        assert!(!supervisor.get_status().running);
    }

    #[tokio::test]
    async fn test_development_mode_spawns_nothing() {
        let config = SidecarConfig {
            mode: SidecarMode::Development,
            host: "127.0.0.1".to_string(),
            dev_port: 8000,
            ..Default::default()
        };
        let supervisor = Supervisor::new(&config).unwrap();
        assert_eq!(supervisor.get_url(), "http://127.0.0.1:8000");

        let status = supervisor.start().await.unwrap();
        assert!(status.running);
        assert_eq!(status.pid, None);
        assert_eq!(supervisor.stop().await.unwrap(), StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let tmp = TempDir::new().unwrap();
        let config = SidecarConfig {
            mode: SidecarMode::Packaged,
            binary_name: "not-installed".to_string(),
            resource_dirs: vec![tmp.path().to_path_buf()],
            ..Default::default()
        };
        let supervisor = Supervisor::new(&config).unwrap();

        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, Error::BinaryNotFound { ref searched, .. } if !searched.is_empty()));
        assert!(!err.is_fatal());
        assert!(!supervisor.get_status().running);
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let server = health_server(200).await;
        let supervisor =
            Supervisor::new(&packaged(&server, script(&tmp, "exec sleep 30"))).unwrap();

        let status = supervisor.start().await.unwrap();
        assert!(status.running);
        assert!(status.pid.is_some());
        assert_eq!(supervisor.liveness(), Liveness::Healthy);
        assert!(supervisor.is_running().await);

        // A second start is a no-op on the same process
        let again = supervisor.start().await.unwrap();
        assert_eq!(again.pid, status.pid);

        let outcome = supervisor.stop().await.unwrap();
        assert!(matches!(outcome, StopOutcome::Graceful { .. }), "{:?}", outcome);
        assert!(!supervisor.get_status().running);
        assert_eq!(supervisor.liveness(), Liveness::Stopped);

        let outcome = tokio_test::assert_ok!(supervisor.stop().await);
        assert_eq!(outcome, StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_start_times_out_against_unhealthy_endpoint() {
        let tmp = TempDir::new().unwrap();
        let server = health_server(503).await;
        let mut config = packaged(&server, script(&tmp, "exec sleep 30"));
        config.startup_timeout_ms = 500;
        let supervisor = Supervisor::new(&config).unwrap();

        let started = Instant::now();
        let err = supervisor.start().await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, Error::StartupTimeout { .. }));
        assert!(elapsed >= config.startup_timeout(), "{:?}", elapsed);
        assert!(
            elapsed < config.startup_timeout() + config.retry_interval() + Duration::from_millis(250),
            "{:?}",
            elapsed
        );

        // The process is not killed on timeout
        assert!(supervisor.get_status().running);
        assert_eq!(supervisor.liveness(), Liveness::Unhealthy);
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_sidecar_recovers_after_timeout() {
        let tmp = TempDir::new().unwrap();
        let server = health_server(503).await;
        let mut config = packaged(&server, script(&tmp, "exec sleep 30"));
        config.startup_timeout_ms = 300;
        config.monitor_interval_secs = 1;
        let supervisor = Supervisor::new(&config).unwrap();

        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, Error::StartupTimeout { .. }));
        assert_eq!(supervisor.liveness(), Liveness::Unhealthy);

        // The sidecar finishes binding after the startup budget
        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut liveness = supervisor.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            liveness.wait_for(|l| *l == Liveness::Healthy),
        )
        .await
        .unwrap()
        .unwrap();

        let pid = supervisor.get_status().pid;
        assert_eq!(supervisor.start().await.unwrap().pid, pid);
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_external_kill() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let tmp = TempDir::new().unwrap();
        let server = health_server(200).await;
        let supervisor =
            Supervisor::new(&packaged(&server, script(&tmp, "exec sleep 30"))).unwrap();

        let first = supervisor.start().await.unwrap().pid.unwrap();
        kill(Pid::from_raw(first as i32), Signal::SIGKILL).unwrap();
        wait_until_stopped(&supervisor).await;
        assert!(!supervisor.get_status().running);

        let second = supervisor.start().await.unwrap();
        assert!(second.running);
        assert_ne!(second.pid, Some(first));
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_kills_process_ignoring_sigterm() {
        let tmp = TempDir::new().unwrap();
        let server = health_server(200).await;
        let config = packaged(
            &server,
            script(&tmp, "trap '' TERM\nwhile true; do sleep 0.1; done"),
        );
        let supervisor = Supervisor::new(&config).unwrap();
        let pid = supervisor.start().await.unwrap().pid.unwrap();

        let started = Instant::now();
        let outcome = supervisor.stop().await.unwrap();
        let elapsed = started.elapsed();

        assert!(matches!(outcome, StopOutcome::Forced { .. }), "{:?}", outcome);
        assert!(elapsed >= config.stop_grace());
        assert!(elapsed < config.stop_grace() + Duration::from_secs(1), "{:?}", elapsed);

        // Reaped: the pid no longer refers to a live process
        let probe = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None);
        assert!(probe.is_err());
    }

    #[tokio::test]
    async fn test_early_exit_fails_start() {
        let tmp = TempDir::new().unwrap();
        let server = health_server(503).await;
        let supervisor = Supervisor::new(&packaged(&server, script(&tmp, "exit 3"))).unwrap();

        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, Error::SidecarExited(_)), "{:?}", err);
        assert!(!supervisor.get_status().running);
    }

    #[tokio::test]
    async fn test_custom_observer_receives_reports() {
        #[derive(Default)]
        struct Counting(std::sync::atomic::AtomicU32);
        impl HealthObserver for Counting {
            fn observe(&self, _report: &HealthReport) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let tmp = TempDir::new().unwrap();
        let server = health_server(200).await;
        let mut config = packaged(&server, script(&tmp, "exec sleep 30"));
        config.monitor_interval_secs = 1;
        let observer = Arc::new(Counting::default());
        let supervisor = Supervisor::builder(&config)
            .observer(observer.clone())
            .build()
            .unwrap();

        supervisor.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_300)).await;
        assert!(observer.0.load(std::sync::atomic::Ordering::SeqCst) >= 1);
        supervisor.stop().await.unwrap();
    }
}
