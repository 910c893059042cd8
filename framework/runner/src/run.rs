use std::sync::Arc;

use anyhow::Context;
use chaos_lite_core::prelude::TokioClock;
use chaos_lite_instruments::prelude::{HealthCheck, LatencyControl, LatencyMs};
use chaos_lite_summary_model::{load_rounds, RunSummary};

use crate::cli::Command;
use crate::definition::{ChaosDefinition, ChaosDefinitionBuilder};
use crate::executor::Executor;
use crate::fault::DockerFaultDriver;
use crate::orchestrator::{ChaosOrchestrator, Collaborators, RunOutcome};
use crate::progress::round_progress;
use crate::random::{Pick, RngPicker};
use crate::shutdown::start_shutdown_listener;
use crate::types::ChaosLiteResult;

pub fn run(definition: ChaosDefinitionBuilder) -> ChaosLiteResult<()> {
    let definition = definition.build()?;

    log::info!("Running scenario: {}", definition.name);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime)?;
    let executor = Executor::new(runtime, shutdown_handle);
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to create HTTP client")?;

    match definition.command.clone() {
        Some(Command::Probe) => probe(&executor, &definition, client),
        Some(Command::SetLatency { latency_ms }) => {
            set_latency(&executor, &definition, client, latency_ms)
        }
        Some(Command::ClearLatency) => {
            set_latency(&executor, &definition, client, LatencyMs::ZERO)
        }
        Some(Command::Summarise) => summarise(&definition),
        None => run_rounds(&executor, definition, client),
    }
}

fn probe(
    executor: &Executor,
    definition: &ChaosDefinition,
    client: reqwest::Client,
) -> ChaosLiteResult<()> {
    let probe = definition.endpoints.health_probe(client, definition.timeouts);

    executor.execute_in_place(async move {
        probe
            .check()
            .await
            .with_context(|| format!("{} is not healthy", probe.url()))?;
        log::info!("{} is healthy", probe.url());
        Ok(())
    })
}

fn set_latency(
    executor: &Executor,
    definition: &ChaosDefinition,
    client: reqwest::Client,
    latency: LatencyMs,
) -> ChaosLiteResult<()> {
    let controller = definition
        .endpoints
        .latency_controller(client, definition.timeouts);
    let url = definition.endpoints.chaos_url();

    executor.execute_in_place(async move {
        controller
            .try_set_latency(latency)
            .await
            .with_context(|| format!("Failed to set latency {latency} through {url}"))?;
        log::info!("Latency set to {latency}");
        Ok(())
    })
}

fn summarise(definition: &ChaosDefinition) -> ChaosLiteResult<()> {
    let rounds = load_rounds(&definition.report)
        .with_context(|| format!("Failed to read report {}", definition.report.display()))?;

    println!("{}", RunSummary::from_rounds(&rounds));

    Ok(())
}

fn run_rounds(
    executor: &Executor,
    definition: ChaosDefinition,
    client: reqwest::Client,
) -> ChaosLiteResult<()> {
    let fault = DockerFaultDriver::from_env()?;

    let picker: Box<dyn Pick> = match definition.seed {
        Some(seed) => {
            log::info!("Choosing faults with seed {seed}");
            Box::new(RngPicker::seeded(seed))
        }
        None => Box::new(RngPicker::from_entropy()),
    };

    let endpoints = &definition.endpoints;
    let collaborators = Collaborators {
        health: Arc::new(endpoints.health_probe(client.clone(), definition.timeouts)),
        latency: Arc::new(endpoints.latency_controller(client.clone(), definition.timeouts)),
        rtt: Arc::new(endpoints.primary_endpoint(client, definition.timeouts)),
        fault: Arc::new(fault),
        clock: Arc::new(TokioClock::new()),
        picker,
    };

    let progress = if definition.no_progress {
        None
    } else {
        Some(round_progress(definition.orchestrator.rounds))
    };

    let mut orchestrator = ChaosOrchestrator::new(
        definition.orchestrator,
        collaborators,
        executor.shutdown_handle().new_listener(),
    )?
    .with_progress(progress);

    let outcome = executor.execute_cooperatively(orchestrator.run(&definition.report))?;

    match outcome {
        RunOutcome::Completed { summary, report } => {
            println!("{summary}");
            log::info!("Report written to {}", report.display());
        }
        RunOutcome::Cancelled { rounds_completed } => {
            log::info!(
                "Cancelled after {rounds_completed} rounds, partial report left at {}",
                definition.report.display()
            );
        }
    }

    Ok(())
}
