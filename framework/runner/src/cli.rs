use std::path::PathBuf;
use std::time::Duration;

use chaos_lite_instruments::prelude::LatencyMs;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(about, long_about = None)]
pub struct ChaosLiteCli {
    /// Public base URL of the target. The health endpoint is `<web-base>/health`.
    #[arg(long, env = "WEB_BASE", default_value = "http://localhost:8080", global = true)]
    pub web_base: String,

    /// Base URL of the target's API. Requests are timed against `<api-base>/` and latency is
    /// controlled through `<api-base>/chaos`.
    #[arg(long, env = "API_BASE", default_value = "http://localhost:8080/api", global = true)]
    pub api_base: String,

    /// The container to kill in kill rounds.
    #[arg(long, env = "TARGET_CONTAINER", default_value = "chaos-lite-api-1")]
    pub target_container: String,

    /// The number of rounds to run
    #[arg(long, env = "ROUNDS", default_value = "6", value_parser = clap::value_parser!(u32).range(1..))]
    pub rounds: u32,

    /// Seconds to pause between rounds
    #[arg(long, env = "SLEEP_BETWEEN", default_value = "8.0", value_parser = parse_seconds)]
    pub sleep_between: Duration,

    /// Where to write the report. One JSON object per round, one round per line.
    #[arg(long, env = "REPORT", default_value = "chaos_report.jsonl", global = true)]
    pub report: PathBuf,

    /// Seed for choosing faults. Runs with the same seed choose the same sequence of faults.
    #[arg(long, env = "CHAOS_SEED")]
    pub seed: Option<u64>,

    /// Seconds to wait for the target to become healthy before the first round
    #[arg(long, env = "WARMUP_TIMEOUT", default_value = "90", value_parser = parse_seconds)]
    pub warmup_timeout: Duration,

    /// Seconds to wait for the target to recover after a kill
    #[arg(long, env = "RECOVERY_TIMEOUT", default_value = "90", value_parser = parse_seconds)]
    pub recovery_timeout: Duration,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[arg(long, default_value = "false")]
    pub no_progress: bool,

    /// Run a single operation instead of a full chaos run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check the target's health once and report the result
    Probe,
    /// Set the artificial latency on the target, in milliseconds
    SetLatency {
        /// A non-negative integer number of milliseconds
        #[arg(allow_negative_numbers = true)]
        latency_ms: LatencyMs,
    },
    /// Remove any artificial latency from the target
    ClearLatency,
    /// Summarise an existing report without running anything
    Summarise,
}

fn parse_seconds(s: &str) -> anyhow::Result<Duration> {
    let seconds = s
        .trim()
        .parse::<f64>()
        .map_err(|_| anyhow::anyhow!("Expected a number of seconds, got {s:?}"))?;

    Duration::try_from_secs_f64(seconds)
        .map_err(|_| anyhow::anyhow!("Seconds must be finite and not negative, got {s:?}"))
}
