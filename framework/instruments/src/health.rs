use std::time::Duration;

use async_trait::async_trait;
use chaos_lite_core::prelude::{Clock, DelegatedShutdownListener, ShutdownSignalError};
use url::Url;

/// The exact body, ignoring surrounding whitespace, that a healthy target answers with.
pub const HEALTHY_BODY: &str = "ok";

/// Why a single health check did not find the target healthy.
#[derive(Debug, thiserror::Error)]
pub enum Unhealthy {
    #[error("health request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("health endpoint returned status {0}")]
    Status(u16),
    #[error("health endpoint returned unexpected body {0:?}")]
    Body(String),
}

/// A single bounded check of the target's health.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Check once. The error explains why the target is not considered healthy.
    async fn check(&self) -> Result<(), Unhealthy>;

    /// Check once, collapsing every failure into `false`.
    async fn probe(&self) -> bool {
        self.check().await.is_ok()
    }
}

/// Checks `GET /health` on the target. Healthy means a 200 with the body [HEALTHY_BODY].
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(client: reqwest::Client, url: Url, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl HealthCheck for HealthProbe {
    async fn check(&self) -> Result<(), Unhealthy> {
        let response = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Unhealthy::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim() != HEALTHY_BODY {
            return Err(Unhealthy::Body(body));
        }

        Ok(())
    }
}

/// How long to keep polling for health and how often to ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl HealthPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error(
    "health never recovered in {timeout:?} after {attempts} attempts; last error: {}",
    describe(.last_error)
)]
pub struct RecoveryTimeout {
    pub timeout: Duration,
    pub attempts: usize,
    pub last_error: Option<String>,
}

fn describe(last_error: &Option<String>) -> &str {
    last_error.as_deref().unwrap_or("none")
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Timeout(#[from] RecoveryTimeout),
    #[error(transparent)]
    Cancelled(#[from] ShutdownSignalError),
}

/// Poll `check` every `policy.poll_interval` until it reports healthy or `policy.timeout` has
/// elapsed since the first attempt.
///
/// Returns the time from the first attempt until the successful one. No attempt is started once
/// the timeout has elapsed, so a target that never recovers is reported at most one poll interval
/// (plus one in-flight check) after the deadline. The shutdown signal is checked before every
/// attempt and interrupts the wait between attempts.
pub async fn wait_until_healthy(
    check: &dyn HealthCheck,
    clock: &dyn Clock,
    shutdown: &mut DelegatedShutdownListener,
    policy: HealthPolicy,
) -> Result<Duration, PollError> {
    let started = clock.now();
    let mut attempts = 0;
    let mut last_error = None;

    while clock.now() - started < policy.timeout {
        shutdown.check()?;

        attempts += 1;
        match check.check().await {
            Ok(()) => {
                let elapsed = clock.now() - started;
                log::debug!("Healthy after {attempts} attempts in {elapsed:?}");
                return Ok(elapsed);
            }
            Err(e) => {
                log::trace!("Health attempt {attempts} failed: {e}");
                last_error = Some(e.to_string());
            }
        }

        shutdown.sleep(clock, policy.poll_interval).await?;
    }

    Err(RecoveryTimeout {
        timeout: policy.timeout,
        attempts,
        last_error,
    }
    .into())
}
