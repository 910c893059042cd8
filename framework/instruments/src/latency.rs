use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::target::RequestError;

/// An artificial delay to inject into the target, in whole milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LatencyMs(u32);

impl LatencyMs {
    /// Setting this value clears any injected delay.
    pub const ZERO: LatencyMs = LatencyMs(0);

    pub const fn new(ms: u32) -> Self {
        Self(ms)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Display for LatencyMs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LatencyInputError {
    #[error("latency_ms must be an integer, got {0:?}")]
    NotAnInteger(String),
    #[error("latency_ms must not be negative, got {0}")]
    Negative(i64),
    #[error("latency_ms is too large, got {0}")]
    TooLarge(i64),
}

/// Operator input is validated here, before anything is sent to the target.
impl FromStr for LatencyMs {
    type Err = LatencyInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| LatencyInputError::NotAnInteger(s.to_string()))?;

        if value < 0 {
            return Err(LatencyInputError::Negative(value));
        }

        u32::try_from(value)
            .map(Self)
            .map_err(|_| LatencyInputError::TooLarge(value))
    }
}

/// Sets the artificial delay that the target adds to its primary endpoint.
#[async_trait]
pub trait LatencyControl: Send + Sync {
    /// Make a single attempt to set the delay, reporting failure to the caller.
    async fn try_set_latency(&self, latency: LatencyMs) -> Result<(), RequestError>;

    /// Set the delay, logging rather than returning a failure. A failed set never stops a round.
    async fn set_latency(&self, latency: LatencyMs) {
        match self.try_set_latency(latency).await {
            Ok(()) => log::debug!("Latency set to {latency}"),
            Err(e) => log::warn!("Failed to set latency {latency}: {e}"),
        }
    }

    async fn clear_latency(&self) {
        self.set_latency(LatencyMs::ZERO).await;
    }
}

/// Drives `POST /chaos?latency_ms=<n>` on the target.
#[derive(Debug, Clone)]
pub struct LatencyController {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl LatencyController {
    pub fn new(client: reqwest::Client, url: Url, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl LatencyControl for LatencyController {
    async fn try_set_latency(&self, latency: LatencyMs) -> Result<(), RequestError> {
        let response = self
            .client
            .post(self.url.clone())
            .query(&[("latency_ms", latency.get())])
            .timeout(self.timeout)
            .send()
            .await?;

        RequestError::check_status(response)?;

        Ok(())
    }
}
