use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chaos_lite_instruments::prelude::{HealthPolicy, LatencyMs, RequestTimeouts, TargetEndpoints};

use crate::cli::{ChaosLiteCli, Command};
use crate::orchestrator::OrchestratorConfig;

/// The builder for a chaos run definition.
///
/// Command line options cover everything an operator is expected to change between runs. The
/// builder methods fix the rest of the run's shape for a particular scenario binary.
#[derive(Debug)]
pub struct ChaosDefinitionBuilder {
    /// The name of the scenario, used in log output.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you and you cannot change it.
    #[doc(hidden)]
    cli: ChaosLiteCli,
    latency_menu: Vec<LatencyMs>,
    rtt_samples: usize,
    rtt_pacing: Duration,
    poll_interval: Duration,
    timeouts: RequestTimeouts,
}

#[derive(Debug, Clone)]
pub struct ChaosDefinition {
    pub name: String,
    pub command: Option<Command>,
    pub endpoints: TargetEndpoints,
    pub report: PathBuf,
    pub orchestrator: OrchestratorConfig,
    pub seed: Option<u64>,
    pub no_progress: bool,
    pub timeouts: RequestTimeouts,
}

impl ChaosDefinitionBuilder {
    /// Initialise logging, parse the command line arguments and create a new definition from them.
    /// See the [ChaosDefinitionBuilder::name] for more information about the name.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, crate::init::init())
    }

    /// Create a new definition from the scenario name and already parsed arguments.
    pub fn new(name: &str, cli: ChaosLiteCli) -> Self {
        let defaults = OrchestratorConfig::default();

        Self {
            name: name.to_string(),
            cli,
            latency_menu: defaults.latency_menu,
            rtt_samples: defaults.rtt_samples,
            rtt_pacing: defaults.rtt_pacing,
            poll_interval: defaults.recovery.poll_interval,
            timeouts: RequestTimeouts::default(),
        }
    }

    /// Latency values, in milliseconds, that latency rounds choose from.
    pub fn with_latency_menu(mut self, menu: &[u32]) -> Self {
        self.latency_menu = menu.iter().copied().map(LatencyMs::new).collect();
        self
    }

    /// Number of requests timed in each latency round.
    pub fn with_rtt_samples(mut self, samples: usize) -> Self {
        self.rtt_samples = samples;
        self
    }

    /// Pause between the timed requests of a latency round.
    pub fn with_rtt_pacing(mut self, pacing: Duration) -> Self {
        self.rtt_pacing = pacing;
        self
    }

    /// How often health is checked while waiting for the target, both at warm-up and after a kill.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_request_timeouts(mut self, timeouts: RequestTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ChaosDefinition> {
        let cli = self.cli;

        let endpoints = TargetEndpoints::new(&cli.web_base, &cli.api_base).with_context(|| {
            format!(
                "Invalid target endpoints, web base {:?}, api base {:?}",
                cli.web_base, cli.api_base
            )
        })?;

        let orchestrator = OrchestratorConfig {
            target: cli.target_container,
            rounds: cli.rounds as usize,
            inter_round_delay: cli.sleep_between,
            warmup: HealthPolicy::new(cli.warmup_timeout, self.poll_interval),
            recovery: HealthPolicy::new(cli.recovery_timeout, self.poll_interval),
            latency_menu: self.latency_menu,
            rtt_samples: self.rtt_samples,
            rtt_pacing: self.rtt_pacing,
        };
        orchestrator
            .validate()
            .with_context(|| format!("Invalid definition for {}", self.name))?;

        Ok(ChaosDefinition {
            name: self.name,
            command: cli.command,
            endpoints,
            report: cli.report,
            orchestrator,
            seed: cli.seed,
            no_progress: cli.no_progress,
            timeouts: self.timeouts,
        })
    }
}
