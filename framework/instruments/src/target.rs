use std::time::Duration;

use url::Url;

use crate::health::HealthProbe;
use crate::latency::LatencyController;
use crate::rtt::PrimaryEndpoint;

/// Why a request to the target did not count as a success.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
}

impl RequestError {
    /// Map a response to an error unless its status is 2xx.
    pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Self> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(Self::Status(status.as_u16()))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid base URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("base URL must use http or https, got {0:?}")]
    Scheme(String),
}

/// Per-call timeouts for each kind of request made against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub health: Duration,
    pub control: Duration,
    pub request: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(3),
            control: Duration::from_secs(5),
            request: Duration::from_secs(10),
        }
    }
}

/// The two base URLs that the target is reached through.
///
/// The health endpoint hangs off the public base, the primary and control endpoints hang off the
/// API base. They may be the same service behind a proxy or two different listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEndpoints {
    web_base: Url,
    api_base: Url,
}

impl TargetEndpoints {
    pub fn new(web_base: &str, api_base: &str) -> Result<Self, EndpointError> {
        Ok(Self {
            web_base: parse_base(web_base)?,
            api_base: parse_base(api_base)?,
        })
    }

    pub fn health_url(&self) -> Url {
        append_path(&self.web_base, "health")
    }

    pub fn primary_url(&self) -> Url {
        append_path(&self.api_base, "")
    }

    pub fn chaos_url(&self) -> Url {
        append_path(&self.api_base, "chaos")
    }

    pub fn health_probe(&self, client: reqwest::Client, timeouts: RequestTimeouts) -> HealthProbe {
        HealthProbe::new(client, self.health_url(), timeouts.health)
    }

    pub fn latency_controller(
        &self,
        client: reqwest::Client,
        timeouts: RequestTimeouts,
    ) -> LatencyController {
        LatencyController::new(client, self.chaos_url(), timeouts.control)
    }

    pub fn primary_endpoint(
        &self,
        client: reqwest::Client,
        timeouts: RequestTimeouts,
    ) -> PrimaryEndpoint {
        PrimaryEndpoint::new(client, self.primary_url(), timeouts.request)
    }
}

fn parse_base(base: &str) -> Result<Url, EndpointError> {
    let url = Url::parse(base)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(EndpointError::Scheme(other.to_string())),
    }
}

/// `Url::join` replaces the last segment of a base without a trailing slash, which would turn
/// `http://host/api` + `chaos` into `http://host/chaos`. Append instead.
fn append_path(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), segment);
    url.set_path(&path);
    url
}
