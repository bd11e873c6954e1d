//! Liveness probing and the startup readiness wait

use crate::config::SidecarConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// A single liveness check against the sidecar
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// `Ok` only on a definitive healthy answer within `timeout`
    async fn check(&self, timeout: Duration) -> Result<()>;
}

/// `GET <base>/health`; healthy means HTTP 200
pub struct HttpHealthProbe {
    client: Client,
    url: Url,
}

impl HttpHealthProbe {
    pub fn new(base_url: &str, health_path: &str) -> Result<Self> {
        let url = Url::parse(base_url)
            .and_then(|base| base.join(health_path))
            .map_err(|e| Error::Config(format!("Invalid sidecar health URL: {}", e)))?;
        // Loopback only; a system proxy would make a healthy sidecar look down
        let client = Client::builder().no_proxy().build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, timeout: Duration) -> Result<()> {
        let response = self
            .client
            .get(self.url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::HealthCheckFailure(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(Error::HealthCheckFailure(format!(
                "{} returned {}",
                self.url, status
            ))),
        }
    }
}

/// Timing for the startup readiness wait
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPolicy {
    /// Delay before the first probe
    pub grace: Duration,
    pub retry_interval: Duration,
    pub probe_timeout: Duration,
    /// Overall budget, measured from the start of the wait
    pub startup_timeout: Duration,
}

impl ReadinessPolicy {
    pub fn from_config(config: &SidecarConfig) -> Self {
        Self {
            grace: config.startup_grace(),
            retry_interval: config.retry_interval(),
            probe_timeout: config.probe_timeout(),
            startup_timeout: config.startup_timeout(),
        }
    }
}

/// Probe until healthy or the startup budget runs out.
///
/// Probe timeouts and retry sleeps are clipped to the remaining budget, so
/// the timeout error is never raised later than one retry interval past the
/// deadline.
pub async fn wait_for_ready(probe: &dyn HealthProbe, policy: &ReadinessPolicy) -> Result<()> {
    let deadline = Instant::now() + policy.startup_timeout;
    let timed_out = || Error::StartupTimeout {
        timeout: policy.startup_timeout,
    };

    tokio::time::sleep(policy.grace.min(policy.startup_timeout)).await;

    let mut attempt = 0u32;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out());
        }

        attempt += 1;
        match probe.check(policy.probe_timeout.min(remaining)).await {
            Ok(()) => {
                debug!("Sidecar ready after {} probe(s)", attempt);
                return Ok(());
            }
            Err(e) => debug!("Readiness probe {} failed: {}", attempt, e),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out());
        }
        tokio::time::sleep(policy.retry_interval.min(remaining)).await;
    }
}
