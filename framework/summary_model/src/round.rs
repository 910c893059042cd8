use std::fmt::{Display, Formatter};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of fault injected in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Kill,
    Latency,
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Kill => f.write_str("kill"),
            EventKind::Latency => f.write_str("latency"),
        }
    }
}

/// What a round did and what it measured.
///
/// Each variant only has room for its own measurement, so a kill round can never carry an RTT and
/// a latency round can never carry a recovery time.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Kill {
        /// The identifier the fault was injected against.
        target: String,
        /// Time from restore until healthy. `None` if health never came back in time.
        recovery: Option<Duration>,
    },
    Latency {
        latency_ms: u32,
        /// Mean RTT of the successful samples. `None` if every sample failed.
        avg_rtt: Option<Duration>,
    },
}

/// One fault-injection iteration and its recorded outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RoundRecord", try_from = "RoundRecord")]
pub struct Round {
    timestamp: DateTime<Utc>,
    outcome: RoundOutcome,
}

impl Round {
    pub fn kill(timestamp: DateTime<Utc>, target: String, recovery: Option<Duration>) -> Self {
        Self {
            timestamp,
            outcome: RoundOutcome::Kill { target, recovery },
        }
    }

    pub fn latency(timestamp: DateTime<Utc>, latency_ms: u32, avg_rtt: Option<Duration>) -> Self {
        Self {
            timestamp,
            outcome: RoundOutcome::Latency {
                latency_ms,
                avg_rtt,
            },
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn outcome(&self) -> &RoundOutcome {
        &self.outcome
    }

    pub fn event(&self) -> EventKind {
        match self.outcome {
            RoundOutcome::Kill { .. } => EventKind::Kill,
            RoundOutcome::Latency { .. } => EventKind::Latency,
        }
    }

    pub fn recovery(&self) -> Option<Duration> {
        match self.outcome {
            RoundOutcome::Kill { recovery, .. } => recovery,
            RoundOutcome::Latency { .. } => None,
        }
    }

    pub fn avg_rtt(&self) -> Option<Duration> {
        match self.outcome {
            RoundOutcome::Kill { .. } => None,
            RoundOutcome::Latency { avg_rtt, .. } => avg_rtt,
        }
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            RoundOutcome::Kill { target, recovery } => match recovery {
                Some(recovery) => write!(
                    f,
                    "kill {target}: recovered in {:.3}s",
                    recovery.as_secs_f64()
                ),
                None => write!(f, "kill {target}: did not recover"),
            },
            RoundOutcome::Latency {
                latency_ms,
                avg_rtt,
            } => match avg_rtt {
                Some(avg_rtt) => write!(
                    f,
                    "latency {latency_ms}ms: avg rtt {:.3}s",
                    avg_rtt.as_secs_f64()
                ),
                None => write!(f, "latency {latency_ms}ms: no successful samples"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidRound {
    #[error("{event} round has the wrong kind of param")]
    ParamMismatch { event: EventKind },
    #[error("{event} round must not have a value for {field}")]
    UnexpectedValue {
        event: EventKind,
        field: &'static str,
    },
    #[error("{field} must be a finite, non-negative number of seconds, got {value}")]
    InvalidSeconds { field: &'static str, value: f64 },
}

/// The flat, on-disk shape of a [Round]. Field order is the record's column order.
#[derive(Debug, Serialize, Deserialize)]
struct RoundRecord {
    timestamp: DateTime<Utc>,
    event: EventKind,
    param: RoundParam,
    recovery_seconds: Option<f64>,
    avg_rtt_seconds: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RoundParam {
    Millis(u32),
    Target(String),
}

impl From<Round> for RoundRecord {
    fn from(round: Round) -> Self {
        let event = round.event();
        let (param, recovery_seconds, avg_rtt_seconds) = match round.outcome {
            RoundOutcome::Kill { target, recovery } => (
                RoundParam::Target(target),
                recovery.map(|d| d.as_secs_f64()),
                None,
            ),
            RoundOutcome::Latency {
                latency_ms,
                avg_rtt,
            } => (
                RoundParam::Millis(latency_ms),
                None,
                avg_rtt.map(|d| d.as_secs_f64()),
            ),
        };

        Self {
            timestamp: round.timestamp,
            event,
            param,
            recovery_seconds,
            avg_rtt_seconds,
        }
    }
}

impl TryFrom<RoundRecord> for Round {
    type Error = InvalidRound;

    fn try_from(record: RoundRecord) -> Result<Self, Self::Error> {
        let event = record.event;
        let outcome = match (event, record.param) {
            (EventKind::Kill, RoundParam::Target(target)) => {
                if record.avg_rtt_seconds.is_some() {
                    return Err(InvalidRound::UnexpectedValue {
                        event,
                        field: "avg_rtt_seconds",
                    });
                }
                RoundOutcome::Kill {
                    target,
                    recovery: seconds("recovery_seconds", record.recovery_seconds)?,
                }
            }
            (EventKind::Latency, RoundParam::Millis(latency_ms)) => {
                if record.recovery_seconds.is_some() {
                    return Err(InvalidRound::UnexpectedValue {
                        event,
                        field: "recovery_seconds",
                    });
                }
                RoundOutcome::Latency {
                    latency_ms,
                    avg_rtt: seconds("avg_rtt_seconds", record.avg_rtt_seconds)?,
                }
            }
            _ => return Err(InvalidRound::ParamMismatch { event }),
        };

        Ok(Self {
            timestamp: record.timestamp,
            outcome,
        })
    }
}

fn seconds(field: &'static str, value: Option<f64>) -> Result<Option<Duration>, InvalidRound> {
    value
        .map(|value| {
            Duration::try_from_secs_f64(value)
                .map_err(|_| InvalidRound::InvalidSeconds { field, value })
        })
        .transpose()
}
