mod health;
mod latency;
mod rtt;
mod target;

pub mod prelude {
    pub use crate::health::{
        wait_until_healthy, HealthCheck, HealthPolicy, HealthProbe, PollError, RecoveryTimeout,
        Unhealthy, HEALTHY_BODY,
    };
    pub use crate::latency::{LatencyControl, LatencyController, LatencyInputError, LatencyMs};
    pub use crate::rtt::{mean_of_successes, PrimaryEndpoint, RoundTrip, RttSample, RttSampler};
    pub use crate::target::{EndpointError, RequestError, RequestTimeouts, TargetEndpoints};
}
