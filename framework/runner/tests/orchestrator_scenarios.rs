use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chaos_lite_runner::prelude::*;
use chaos_lite_summary_model::load_rounds;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const KILL: usize = 0;
const LATENCY: usize = 1;

#[derive(Default)]
struct TargetState {
    /// Failed checks left before the target is healthy again. `None` means it never recovers.
    pending_failures: Option<usize>,
    /// What `pending_failures` becomes after each kill
    recoveries: VecDeque<Option<usize>>,
    /// Duration of each primary request, `None` for a failed request
    rtts: VecDeque<Option<Duration>>,
    rtt_calls: usize,
    latency_calls: Vec<u32>,
    fault_calls: Vec<String>,
}

/// An in-memory target that answers every collaborator role of the orchestrator.
struct FakeTarget {
    clock: ManualClock,
    state: Mutex<TargetState>,
    shutdown_on_disrupt: Option<ShutdownHandle>,
    /// Request shutdown while serving this primary request, counting from 1
    shutdown_on_rtt: Option<(usize, ShutdownHandle)>,
}

impl FakeTarget {
    fn latency_calls(&self) -> Vec<u32> {
        self.state.lock().latency_calls.clone()
    }

    fn fault_calls(&self) -> Vec<String> {
        self.state.lock().fault_calls.clone()
    }
}

#[async_trait]
impl HealthCheck for FakeTarget {
    async fn check(&self) -> Result<(), Unhealthy> {
        let mut state = self.state.lock();
        match state.pending_failures {
            Some(0) => Ok(()),
            Some(n) => {
                state.pending_failures = Some(n - 1);
                Err(Unhealthy::Status(503))
            }
            None => Err(Unhealthy::Status(503)),
        }
    }
}

#[async_trait]
impl LatencyControl for FakeTarget {
    async fn try_set_latency(&self, latency: LatencyMs) -> Result<(), RequestError> {
        self.state.lock().latency_calls.push(latency.get());
        Ok(())
    }
}

#[async_trait]
impl RoundTrip for FakeTarget {
    async fn round_trip(&self) -> Result<(), RequestError> {
        let next = {
            let mut state = self.state.lock();
            state.rtt_calls += 1;
            if let Some((call, shutdown)) = &self.shutdown_on_rtt {
                if *call == state.rtt_calls {
                    shutdown.shutdown();
                }
            }
            state.rtts.pop_front().unwrap_or(Some(Duration::from_millis(10)))
        };

        match next {
            Some(duration) => {
                self.clock.advance(duration);
                Ok(())
            }
            None => Err(RequestError::Status(500)),
        }
    }
}

#[async_trait]
impl FaultDriver for FakeTarget {
    async fn disrupt(&self, target: &str) {
        let mut state = self.state.lock();
        state.fault_calls.push(format!("disrupt {target}"));
        state.pending_failures = state.recoveries.pop_front().unwrap_or(Some(0));

        if let Some(shutdown) = &self.shutdown_on_disrupt {
            shutdown.shutdown();
        }
    }

    async fn restore(&self, target: &str) {
        self.state.lock().fault_calls.push(format!("restore {target}"));
    }
}

struct Harness {
    target: Arc<FakeTarget>,
    clock: ManualClock,
    shutdown: ShutdownHandle,
    dir: TempDir,
}

impl Harness {
    fn new(state: TargetState) -> Self {
        Self::build(state, false, None)
    }

    fn cancelling_on_first_kill(state: TargetState) -> Self {
        Self::build(state, true, None)
    }

    fn cancelling_on_rtt_request(state: TargetState, call: usize) -> Self {
        Self::build(state, false, Some(call))
    }

    fn build(state: TargetState, cancel_on_disrupt: bool, cancel_on_rtt: Option<usize>) -> Self {
        let clock = ManualClock::new(origin());
        let shutdown = ShutdownHandle::new();
        let target = Arc::new(FakeTarget {
            clock: clock.clone(),
            state: Mutex::new(state),
            shutdown_on_disrupt: cancel_on_disrupt.then(|| shutdown.clone()),
            shutdown_on_rtt: cancel_on_rtt.map(|call| (call, shutdown.clone())),
        });

        Self {
            target,
            clock,
            shutdown,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn report(&self) -> PathBuf {
        self.dir.path().join("chaos_report.jsonl")
    }

    fn orchestrator(&self, rounds: usize, picker: impl Pick + 'static) -> ChaosOrchestrator {
        let config = OrchestratorConfig {
            target: "api".to_string(),
            rounds,
            ..Default::default()
        };
        let collaborators = Collaborators {
            health: self.target.clone(),
            latency: self.target.clone(),
            rtt: self.target.clone(),
            fault: self.target.clone(),
            clock: Arc::new(self.clock.clone()),
            picker: Box::new(picker),
        };

        ChaosOrchestrator::new(config, collaborators, self.shutdown.new_listener()).unwrap()
    }
}

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn healthy() -> TargetState {
    TargetState {
        pending_failures: Some(0),
        ..Default::default()
    }
}

#[tokio::test]
async fn six_rounds_against_a_healthy_target() {
    let harness = Harness::new(TargetState {
        recoveries: [Some(4), Some(0), Some(2)].into(),
        ..healthy()
    });
    let picker = ScriptedPicker::new([KILL, LATENCY, 2, KILL, LATENCY, 4, LATENCY, 0, KILL]);
    let mut orchestrator = harness.orchestrator(6, picker);

    let outcome = orchestrator.run(&harness.report()).await.unwrap();

    let rounds = load_rounds(harness.report()).unwrap();
    assert_eq!(6, rounds.len());
    // Warm-up found the target healthy on the first check, so no time passed before round one.
    assert_eq!(origin(), rounds[0].timestamp());
    assert!(rounds.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));

    let events = rounds.iter().map(Round::event).collect::<Vec<_>>();
    assert_eq!(
        vec![
            EventKind::Kill,
            EventKind::Latency,
            EventKind::Kill,
            EventKind::Latency,
            EventKind::Latency,
            EventKind::Kill
        ],
        events
    );

    let recoveries = rounds.iter().filter_map(Round::recovery).collect::<Vec<_>>();
    assert_eq!(
        vec![
            Duration::from_secs(2),
            Duration::ZERO,
            Duration::from_secs(1)
        ],
        recoveries
    );
    assert_eq!(vec![800, 0, 1600, 0, 200, 0], harness.target.latency_calls());

    match outcome {
        RunOutcome::Completed { summary, report } => {
            assert_eq!(harness.report(), report);
            assert_eq!(3, summary.kill_count);
            assert_eq!(Some(1.0), summary.mean_recovery_seconds);
            assert_eq!(3, summary.latency_count);
            assert_eq!(6, summary.total_rounds());
        }
        other => panic!("expected a completed run, got {other:?}"),
    }
    assert_eq!(Phase::Complete, orchestrator.phase());
}

#[tokio::test]
async fn kill_without_recovery_is_recorded_as_a_gap_and_the_run_continues() {
    let harness = Harness::new(TargetState {
        recoveries: [None, Some(1)].into(),
        ..healthy()
    });
    let mut orchestrator = harness.orchestrator(2, ScriptedPicker::new([KILL, KILL]));

    let outcome = orchestrator.run(&harness.report()).await.unwrap();

    let rounds = load_rounds(harness.report()).unwrap();
    assert_eq!(2, rounds.len());
    assert_eq!(EventKind::Kill, rounds[0].event());
    assert_eq!(None, rounds[0].recovery());
    assert_eq!(Some(Duration::from_millis(500)), rounds[1].recovery());
    assert_eq!(
        vec!["disrupt api", "restore api", "disrupt api", "restore api"],
        harness.target.fault_calls()
    );

    // The failed recovery waited out its full timeout before the run moved on.
    let gap = rounds[1].timestamp() - rounds[0].timestamp();
    assert!(gap >= chrono::Duration::seconds(90 + 8), "{gap}");

    let RunOutcome::Completed { summary, .. } = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(2, summary.kill_count);
    assert_eq!(1, summary.recovery_timeouts);
    assert_eq!(Some(0.5), summary.mean_recovery_seconds);
}

#[tokio::test]
async fn latency_round_averages_successful_samples_and_clears_latency() {
    let ok = Some(Duration::from_millis(850));
    let harness = Harness::new(TargetState {
        rtts: [ok, None, ok, ok, ok, None, ok, ok, ok, None, ok, ok].into(),
        ..healthy()
    });
    let mut orchestrator = harness.orchestrator(1, ScriptedPicker::new([LATENCY, 2]));

    orchestrator.run(&harness.report()).await.unwrap();

    let rounds = load_rounds(harness.report()).unwrap();
    assert_eq!(1, rounds.len());
    match rounds[0].outcome() {
        RoundOutcome::Latency {
            latency_ms,
            avg_rtt,
        } => {
            assert_eq!(800, *latency_ms);
            let avg_rtt = avg_rtt.expect("nine samples succeeded").as_secs_f64();
            assert!((avg_rtt - 0.85).abs() < 1e-6, "{avg_rtt}");
        }
        other => panic!("expected a latency round, got {other:?}"),
    }
    assert_eq!(vec![800, 0], harness.target.latency_calls());
}

#[tokio::test]
async fn latency_is_cleared_even_when_every_sample_fails() {
    let harness = Harness::new(TargetState {
        rtts: vec![None; 12].into(),
        ..healthy()
    });
    let mut orchestrator = harness.orchestrator(1, ScriptedPicker::new([LATENCY, 4]));

    orchestrator.run(&harness.report()).await.unwrap();

    let rounds = load_rounds(harness.report()).unwrap();
    assert_eq!(None, rounds[0].avg_rtt());
    assert_eq!(vec![1600, 0], harness.target.latency_calls());
}

#[tokio::test]
async fn every_record_has_exactly_the_measurement_of_its_event() {
    let harness = Harness::new(TargetState {
        recoveries: [None, Some(3)].into(),
        rtts: vec![None; 12].into(),
        ..healthy()
    });
    let picker = ScriptedPicker::new([KILL, LATENCY, 1, KILL, LATENCY, 3]);
    let mut orchestrator = harness.orchestrator(4, picker);

    orchestrator.run(&harness.report()).await.unwrap();

    let contents = std::fs::read_to_string(harness.report()).unwrap();
    let records = contents
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(4, records.len());

    for record in records {
        match record["event"].as_str() {
            Some("kill") => {
                assert!(record["param"].is_string(), "{record}");
                assert!(record["avg_rtt_seconds"].is_null(), "{record}");
            }
            Some("latency") => {
                assert!(record["param"].is_u64(), "{record}");
                assert!(record["recovery_seconds"].is_null(), "{record}");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn cancellation_clears_latency_once_and_skips_the_summary() {
    let harness = Harness::cancelling_on_first_kill(healthy());
    let picker = ScriptedPicker::new([LATENCY, 0, KILL, LATENCY, 1]);
    let mut orchestrator = harness.orchestrator(3, picker);

    let outcome = orchestrator.run(&harness.report()).await.unwrap();

    assert_eq!(
        RunOutcome::Cancelled {
            rounds_completed: 1
        },
        outcome
    );
    // One clear from the finished latency round and one from cancelling.
    assert_eq!(vec![200, 0, 0], harness.target.latency_calls());
    // The kill that was in progress still restored the target.
    assert_eq!(
        vec!["disrupt api", "restore api"],
        harness.target.fault_calls()
    );
    assert_eq!(1, load_rounds(harness.report()).unwrap().len());
    assert_eq!(Phase::Idle, orchestrator.phase());
}

#[tokio::test]
async fn cancellation_while_sampling_clears_latency_once() {
    let harness = Harness::cancelling_on_rtt_request(healthy(), 5);
    let mut orchestrator = harness.orchestrator(3, ScriptedPicker::new([LATENCY, 2]));

    let outcome = orchestrator.run(&harness.report()).await.unwrap();

    assert_eq!(
        RunOutcome::Cancelled {
            rounds_completed: 0
        },
        outcome
    );
    // The interrupted round does not clear. Cancelling does, once.
    assert_eq!(vec![800, 0], harness.target.latency_calls());
    assert_eq!(5, harness.target.state.lock().rtt_calls);
    assert!(load_rounds(harness.report()).unwrap().is_empty());
    assert_eq!(Phase::Idle, orchestrator.phase());
}

#[tokio::test]
async fn cancellation_before_warm_up_finishes_writes_no_report() {
    let harness = Harness::new(healthy());
    harness.shutdown.shutdown();
    let mut orchestrator = harness.orchestrator(6, ScriptedPicker::default());

    let outcome = orchestrator.run(&harness.report()).await.unwrap();

    assert_eq!(
        RunOutcome::Cancelled {
            rounds_completed: 0
        },
        outcome
    );
    assert_eq!(vec![0], harness.target.latency_calls());
    assert!(!harness.report().exists());
}

#[tokio::test]
async fn warm_up_timeout_is_fatal() {
    let harness = Harness::new(TargetState::default());
    let mut orchestrator = harness.orchestrator(6, ScriptedPicker::default());

    let err = orchestrator.run(&harness.report()).await.unwrap_err();

    match err {
        ChaosError::WarmupTimeout(timeout) => {
            assert_eq!(Duration::from_secs(90), timeout.timeout);
            assert_eq!(180, timeout.attempts);
        }
        other => panic!("expected a warm-up timeout, got {other:?}"),
    }
    assert!(!harness.report().exists());
    assert!(harness.target.fault_calls().is_empty());
    assert!(harness.target.latency_calls().is_empty());
}

#[tokio::test]
async fn same_seed_chooses_the_same_rounds() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let harness = Harness::new(healthy());
        let mut orchestrator = harness.orchestrator(6, RngPicker::seeded(1234));
        orchestrator.run(&harness.report()).await.unwrap();

        runs.push((
            load_rounds(harness.report()).unwrap(),
            harness.target.latency_calls(),
        ));
    }

    assert_eq!(runs[0], runs[1]);
}
