use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chaos_lite_core::prelude::{Clock, DelegatedShutdownListener, ShutdownSignalError};
use url::Url;

use crate::target::RequestError;

/// One timed request. `None` means the request failed and has no duration.
pub type RttSample = Option<Duration>;

/// A single request against the target whose round trip is being measured.
#[async_trait]
pub trait RoundTrip: Send + Sync {
    async fn round_trip(&self) -> Result<(), RequestError>;
}

/// `GET /` on the target. Any 2xx counts as a success.
#[derive(Debug, Clone)]
pub struct PrimaryEndpoint {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl PrimaryEndpoint {
    pub fn new(client: reqwest::Client, url: Url, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl RoundTrip for PrimaryEndpoint {
    async fn round_trip(&self) -> Result<(), RequestError> {
        let response = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        RequestError::check_status(response)?;

        Ok(())
    }
}

/// Issues sequential, paced requests and averages the ones that succeeded.
#[derive(Clone)]
pub struct RttSampler {
    endpoint: Arc<dyn RoundTrip>,
    clock: Arc<dyn Clock>,
    pacing: Duration,
}

impl RttSampler {
    pub fn new(endpoint: Arc<dyn RoundTrip>, clock: Arc<dyn Clock>, pacing: Duration) -> Self {
        Self {
            endpoint,
            clock,
            pacing,
        }
    }

    /// Time `attempts` requests, one after another with the configured pacing between them.
    ///
    /// Returns the mean round trip of the successful requests, or `None` when none succeeded.
    /// `None` is "no measurement", never a zero latency.
    pub async fn sample(
        &self,
        attempts: usize,
        shutdown: &mut DelegatedShutdownListener,
    ) -> Result<Option<Duration>, ShutdownSignalError> {
        let mut samples: Vec<RttSample> = Vec::with_capacity(attempts);

        for attempt in 1..=attempts {
            shutdown.check()?;

            let started = self.clock.now();
            let sample = match self.endpoint.round_trip().await {
                Ok(()) => Some(self.clock.now() - started),
                Err(e) => {
                    log::debug!("RTT attempt {attempt}/{attempts} failed: {e}");
                    None
                }
            };
            samples.push(sample);

            shutdown.sleep(self.clock.as_ref(), self.pacing).await?;
        }

        let failed = samples.iter().filter(|s| s.is_none()).count();
        if failed > 0 {
            log::info!("{failed} of {attempts} RTT requests failed");
        }

        Ok(mean_of_successes(&samples))
    }
}

/// Arithmetic mean over the samples that have a duration.
pub fn mean_of_successes(samples: &[RttSample]) -> Option<Duration> {
    let successes = samples.iter().flatten().copied().collect::<Vec<_>>();
    if successes.is_empty() {
        return None;
    }

    let total: Duration = successes.iter().sum();
    Some(total / successes.len() as u32)
}
