use std::fmt::{Display, Formatter};

use itertools::{Either, Itertools};
use serde::{Deserialize, Serialize};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::round::{Round, RoundOutcome};

/// Aggregate view over every round of a run.
///
/// Means are plain arithmetic means over the rounds that have a measurement. Rounds without one
/// are counted in the gap counts instead of being treated as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of kill rounds, including those that never recovered
    pub kill_count: usize,
    /// Kill rounds where health did not come back within the timeout
    pub recovery_timeouts: usize,
    pub mean_recovery_seconds: Option<f64>,
    /// Number of latency rounds, including those without a measurement
    pub latency_count: usize,
    /// Latency rounds where every RTT sample failed
    pub unmeasured_latency_rounds: usize,
    pub mean_rtt_seconds: Option<f64>,
}

impl RunSummary {
    pub fn from_rounds<'a>(rounds: impl IntoIterator<Item = &'a Round>) -> Self {
        let (recoveries, rtts): (Vec<Option<f64>>, Vec<Option<f64>>) =
            rounds.into_iter().partition_map(|round| match round.outcome() {
                RoundOutcome::Kill { recovery, .. } => {
                    Either::Left(recovery.map(|d| d.as_secs_f64()))
                }
                RoundOutcome::Latency { avg_rtt, .. } => {
                    Either::Right(avg_rtt.map(|d| d.as_secs_f64()))
                }
            });

        Self {
            kill_count: recoveries.len(),
            recovery_timeouts: recoveries.iter().filter(|r| r.is_none()).count(),
            mean_recovery_seconds: mean(&recoveries),
            latency_count: rtts.len(),
            unmeasured_latency_rounds: rtts.iter().filter(|r| r.is_none()).count(),
            mean_rtt_seconds: mean(&rtts),
        }
    }

    pub fn total_rounds(&self) -> usize {
        self.kill_count + self.latency_count
    }
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let measured = values.iter().flatten().collect::<Vec<_>>();
    if measured.is_empty() {
        None
    } else {
        Some(measured.iter().copied().sum::<f64>() / measured.len() as f64)
    }
}

#[derive(Tabled)]
struct SummaryRow {
    event: &'static str,
    rounds: usize,
    #[tabled(rename = "without measurement")]
    gaps: usize,
    #[tabled(rename = "mean (s)", display = "seconds")]
    mean: Option<f64>,
}

fn seconds(value: &Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.3}"),
        None => "n/a".to_string(),
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rows = [
            SummaryRow {
                event: "kill (recovery)",
                rounds: self.kill_count,
                gaps: self.recovery_timeouts,
                mean: self.mean_recovery_seconds,
            },
            SummaryRow {
                event: "latency (avg rtt)",
                rounds: self.latency_count,
                gaps: self.unmeasured_latency_rounds,
                mean: self.mean_rtt_seconds,
            },
        ];

        let mut table = Table::new(rows);
        table.with(Style::modern());

        write!(f, "{table}")
    }
}
