use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chaos_lite_core::prelude::{Clock, DelegatedShutdownListener, ShutdownSignalError};
use chaos_lite_instruments::prelude::{
    wait_until_healthy, HealthCheck, HealthPolicy, LatencyControl, LatencyMs, PollError,
    RecoveryTimeout, RoundTrip, RttSampler,
};
use chaos_lite_summary_model::{EventKind, ReportError, ReportStore, Round, RunSummary};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;

use crate::fault::FaultDriver;
use crate::random::Pick;

/// Fault kinds in the order a [Pick] chooses between them.
const EVENTS: [EventKind; 2] = [EventKind::Kill, EventKind::Latency];

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Identifier handed to the [FaultDriver] in kill rounds
    pub target: String,
    pub rounds: usize,
    /// Pause after recording a round, skipped after the last one
    pub inter_round_delay: Duration,
    /// Gate before the first round. Timing out here fails the run.
    pub warmup: HealthPolicy,
    /// Wait for health after a kill. Timing out here only leaves a gap in the report.
    pub recovery: HealthPolicy,
    /// Latency rounds choose uniformly from these
    pub latency_menu: Vec<LatencyMs>,
    pub rtt_samples: usize,
    pub rtt_pacing: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            target: "chaos-lite-api-1".to_string(),
            rounds: 6,
            inter_round_delay: Duration::from_secs(8),
            warmup: HealthPolicy::default(),
            recovery: HealthPolicy::default(),
            latency_menu: [200, 400, 800, 1200, 1600]
                .into_iter()
                .map(LatencyMs::new)
                .collect(),
            rtt_samples: 12,
            rtt_pacing: Duration::from_millis(250),
        }
    }
}

impl OrchestratorConfig {
    /// Reject configurations that could never complete a run.
    pub fn validate(&self) -> Result<(), ChaosError> {
        if self.target.trim().is_empty() {
            return Err(ChaosError::Config("the fault target must not be empty"));
        }
        if self.rounds == 0 {
            return Err(ChaosError::Config("at least one round is required"));
        }
        if self.latency_menu.is_empty() {
            return Err(ChaosError::Config("the latency menu must not be empty"));
        }
        if self.rtt_samples == 0 {
            return Err(ChaosError::Config("at least one RTT sample is required"));
        }
        if self.warmup.poll_interval.is_zero() || self.recovery.poll_interval.is_zero() {
            return Err(ChaosError::Config("the health poll interval must be positive"));
        }

        Ok(())
    }
}

/// Everything the orchestrator talks to.
pub struct Collaborators {
    pub health: Arc<dyn HealthCheck>,
    pub latency: Arc<dyn LatencyControl>,
    pub rtt: Arc<dyn RoundTrip>,
    pub fault: Arc<dyn FaultDriver>,
    pub clock: Arc<dyn Clock>,
    pub picker: Box<dyn Pick>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    WarmingUp,
    Choosing,
    RunningKillRound,
    RunningLatencyRound,
    Recording,
    Cancelling,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed { summary: RunSummary, report: PathBuf },
    /// Stopped by the shutdown signal. Rounds already recorded stay in the report.
    Cancelled { rounds_completed: usize },
}

/// Failures that stop a run. Everything that goes wrong inside a round is recorded as a gap in
/// the report instead.
#[derive(Debug, thiserror::Error)]
pub enum ChaosError {
    #[error("target was not healthy before the first round")]
    WarmupTimeout(#[source] RecoveryTimeout),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("invalid configuration: {0}")]
    Config(&'static str),
}

/// Drives a run: warm-up, then the configured number of rounds, then the summary.
///
/// Rounds run strictly one after another and each is flushed to the report before the next one
/// is chosen. The shutdown signal is honoured between steps and during every wait. Cancelling
/// attempts to clear the injected latency once and skips the summary.
pub struct ChaosOrchestrator {
    config: OrchestratorConfig,
    health: Arc<dyn HealthCheck>,
    latency: Arc<dyn LatencyControl>,
    sampler: RttSampler,
    fault: Arc<dyn FaultDriver>,
    clock: Arc<dyn Clock>,
    picker: Box<dyn Pick>,
    shutdown: DelegatedShutdownListener,
    progress: Option<ProgressBar>,
    phase: Phase,
}

impl ChaosOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        collaborators: Collaborators,
        shutdown: DelegatedShutdownListener,
    ) -> Result<Self, ChaosError> {
        config.validate()?;

        let Collaborators {
            health,
            latency,
            rtt,
            fault,
            clock,
            picker,
        } = collaborators;
        let sampler = RttSampler::new(rtt, clock.clone(), config.rtt_pacing);

        Ok(Self {
            config,
            health,
            latency,
            sampler,
            fault,
            clock,
            picker,
            shutdown,
            progress: None,
            phase: Phase::Idle,
        })
    }

    /// Advance the given progress bar by one for every recorded round.
    pub fn with_progress(mut self, progress: Option<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run to completion or cancellation, writing the report to `report_path`.
    ///
    /// The report is only created once warm-up has succeeded, and any existing file at that path
    /// is replaced.
    pub async fn run(&mut self, report_path: &Path) -> Result<RunOutcome, ChaosError> {
        self.enter(Phase::WarmingUp);
        log::info!(
            "Waiting up to {:?} for the target to become healthy",
            self.config.warmup.timeout
        );
        match wait_until_healthy(
            self.health.as_ref(),
            self.clock.as_ref(),
            &mut self.shutdown,
            self.config.warmup,
        )
        .await
        {
            Ok(elapsed) => {
                log::info!("Target healthy after {:.3}s", elapsed.as_secs_f64());
            }
            Err(PollError::Timeout(e)) => {
                self.enter(Phase::Idle);
                return Err(ChaosError::WarmupTimeout(e));
            }
            Err(PollError::Cancelled(_)) => return Ok(self.cancel(0).await),
        }

        let mut store = ReportStore::create(report_path)?;
        let rounds = self.config.rounds;

        for number in 1..=rounds {
            let round = match self.run_round().await {
                Ok(round) => round,
                Err(_) => return Ok(self.cancel(store.rounds_written()).await),
            };

            self.enter(Phase::Recording);
            store.append(&round)?;
            log::info!("Round {number}/{rounds}: {round}");
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }

            if number < rounds
                && self
                    .shutdown
                    .sleep(self.clock.as_ref(), self.config.inter_round_delay)
                    .await
                    .is_err()
            {
                return Ok(self.cancel(store.rounds_written()).await);
            }
        }

        let summary = store.summarize()?;
        self.enter(Phase::Complete);
        if let Some(progress) = &self.progress {
            progress.finish();
        }

        Ok(RunOutcome::Completed {
            summary,
            report: store.path().to_path_buf(),
        })
    }

    async fn run_round(&mut self) -> Result<Round, ShutdownSignalError> {
        self.shutdown.check()?;

        self.enter(Phase::Choosing);
        let timestamp = self.clock.utc_now();
        match EVENTS[self.picker.pick(EVENTS.len())] {
            EventKind::Kill => {
                self.enter(Phase::RunningKillRound);
                self.kill_round(timestamp).await
            }
            EventKind::Latency => {
                self.enter(Phase::RunningLatencyRound);
                self.latency_round(timestamp).await
            }
        }
    }

    /// Recovery is timed from issuing the restore, not from the target being observed down.
    async fn kill_round(&mut self, timestamp: DateTime<Utc>) -> Result<Round, ShutdownSignalError> {
        let target = self.config.target.clone();

        self.fault.disrupt(&target).await;
        self.fault.restore(&target).await;

        let recovery = match wait_until_healthy(
            self.health.as_ref(),
            self.clock.as_ref(),
            &mut self.shutdown,
            self.config.recovery,
        )
        .await
        {
            Ok(elapsed) => Some(elapsed),
            Err(PollError::Timeout(e)) => {
                log::error!("{target} did not recover: {e}");
                None
            }
            Err(PollError::Cancelled(e)) => return Err(e),
        };

        Ok(Round::kill(timestamp, target, recovery))
    }

    async fn latency_round(
        &mut self,
        timestamp: DateTime<Utc>,
    ) -> Result<Round, ShutdownSignalError> {
        let menu = &self.config.latency_menu;
        let latency = menu[self.picker.pick(menu.len())];
        log::info!("Injecting {latency} of latency");

        self.latency.set_latency(latency).await;
        let avg_rtt = self
            .sampler
            .sample(self.config.rtt_samples, &mut self.shutdown)
            .await?;
        self.latency.clear_latency().await;

        Ok(Round::latency(timestamp, latency.get(), avg_rtt))
    }

    async fn cancel(&mut self, rounds_completed: usize) -> RunOutcome {
        self.enter(Phase::Cancelling);
        log::warn!(
            "Run cancelled after {rounds_completed} of {} rounds, clearing injected latency",
            self.config.rounds
        );
        self.latency.clear_latency().await;

        if let Some(progress) = &self.progress {
            progress.abandon();
        }
        self.enter(Phase::Idle);

        RunOutcome::Cancelled { rounds_completed }
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        OrchestratorConfig::default().validate().unwrap();
    }

    #[test]
    fn unusable_configs_are_rejected() {
        let configs = [
            OrchestratorConfig {
                rounds: 0,
                ..Default::default()
            },
            OrchestratorConfig {
                latency_menu: vec![],
                ..Default::default()
            },
            OrchestratorConfig {
                rtt_samples: 0,
                ..Default::default()
            },
            OrchestratorConfig {
                target: " ".to_string(),
                ..Default::default()
            },
            OrchestratorConfig {
                recovery: HealthPolicy::new(Duration::from_secs(90), Duration::ZERO),
                ..Default::default()
            },
        ];

        for config in configs {
            assert!(
                matches!(config.validate(), Err(ChaosError::Config(_))),
                "{config:?}"
            );
        }
    }
}
