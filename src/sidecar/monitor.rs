//! Steady-state health monitoring
//!
//! The monitor only observes. Every tick's outcome is handed to a
//! [`HealthObserver`], which is where a restart policy would plug in; the
//! default observer logs.

use super::probe::HealthProbe;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Outcome of one monitor tick
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    /// Failed probes in a row, zero after a success
    pub consecutive_failures: u32,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// Receives every monitor report
pub trait HealthObserver: Send + Sync {
    fn observe(&self, report: &HealthReport);
}

/// Logs failures and recoveries; takes no corrective action
#[derive(Debug, Default)]
pub struct LogOnlyObserver;

impl HealthObserver for LogOnlyObserver {
    fn observe(&self, report: &HealthReport) {
        if report.healthy {
            debug!("Sidecar health check passed");
            return;
        }
        warn!(
            "Sidecar health check failed ({} in a row): {}",
            report.consecutive_failures,
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
}

/// Consecutive-failure bookkeeping across ticks
#[derive(Debug, Default)]
pub struct HealthTracker {
    consecutive_failures: u32,
}

impl HealthTracker {
    pub fn record(&mut self, outcome: Result<(), String>) -> HealthReport {
        let recovered = outcome.is_ok() && self.consecutive_failures > 0;
        if recovered {
            info!(
                "Sidecar healthy again after {} failed check(s)",
                self.consecutive_failures
            );
        }

        self.consecutive_failures = match outcome {
            Ok(()) => 0,
            Err(_) => self.consecutive_failures.saturating_add(1),
        };
        HealthReport {
            healthy: outcome.is_ok(),
            consecutive_failures: self.consecutive_failures,
            checked_at: Utc::now(),
            error: outcome.err(),
        }
    }
}

/// Spawn the monitor loop.
///
/// `publish` receives each report and returns `false` once the process this
/// monitor was started for is no longer current, which ends the loop. Only
/// one probe is outstanding at a time; a slow tick delays the next.
pub fn spawn_monitor<F>(
    probe: Arc<dyn HealthProbe>,
    observer: Arc<dyn HealthObserver>,
    interval: Duration,
    probe_timeout: Duration,
    publish: F,
) -> JoinHandle<()>
where
    F: Fn(&HealthReport) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; readiness was just confirmed
        ticker.tick().await;

        let mut tracker = HealthTracker::default();
        loop {
            ticker.tick().await;
            let outcome = probe
                .check(probe_timeout)
                .await
                .map_err(|e| e.to_string());
            let report = tracker.record(outcome);
            if !publish(&report) {
                debug!("Monitor for a replaced sidecar process exiting");
                break;
            }
            observer.observe(&report);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_tracker_counts_consecutive_failures() {
        let mut tracker = HealthTracker::default();
        assert_eq!(tracker.record(Err("down".into())).consecutive_failures, 1);
        assert_eq!(tracker.record(Err("down".into())).consecutive_failures, 2);

        let recovered = tracker.record(Ok(()));
        assert!(recovered.healthy);
        assert_eq!(recovered.consecutive_failures, 0);
        assert!(recovered.error.is_none());

        let failed = tracker.record(Err("refused".into()));
        assert_eq!(failed.consecutive_failures, 1);
        assert_eq!(failed.error.as_deref(), Some("refused"));
    }

    /// Fails every other call
    struct AlternatingProbe(AtomicU32);

    #[async_trait]
    impl HealthProbe for AlternatingProbe {
        async fn check(&self, _timeout: Duration) -> Result<()> {
            if self.0.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Ok(())
            } else {
                Err(Error::HealthCheckFailure("503".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<HealthReport>>);

    impl HealthObserver for Recorder {
        fn observe(&self, report: &HealthReport) {
            self.0.lock().unwrap().push(report.clone());
        }
    }

    #[tokio::test]
    async fn test_monitor_reports_each_tick_until_replaced() {
        let recorder = Arc::new(Recorder::default());
        let published = Arc::new(AtomicU32::new(0));
        let counter = published.clone();

        let handle = spawn_monitor(
            Arc::new(AlternatingProbe(AtomicU32::new(0))),
            recorder.clone(),
            Duration::from_millis(20),
            Duration::from_millis(10),
            move |_| counter.fetch_add(1, Ordering::SeqCst) < 4,
        );

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let reports = recorder.0.lock().unwrap();
        assert_eq!(published.load(Ordering::SeqCst), 5);
        assert_eq!(reports.len(), 4);
        let healthy: Vec<_> = reports.iter().map(|r| r.healthy).collect();
        assert_eq!(healthy, vec![true, false, true, false]);
    }
}
