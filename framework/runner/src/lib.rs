mod cli;
mod definition;
mod executor;
mod fault;
mod init;
mod orchestrator;
mod progress;
mod random;
mod run;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::cli::{ChaosLiteCli, Command};
    pub use crate::definition::{ChaosDefinition, ChaosDefinitionBuilder};
    pub use crate::fault::{docker_path, DockerFaultDriver, FaultDriver, CHAOS_DOCKER_PATH_ENV};
    pub use crate::init::init;
    pub use crate::orchestrator::{
        ChaosError, ChaosOrchestrator, Collaborators, OrchestratorConfig, Phase, RunOutcome,
    };
    pub use crate::random::{Pick, RngPicker, ScriptedPicker};
    pub use crate::run::run;
    pub use crate::types::ChaosLiteResult;

    /// Re-export of the core and instrument preludes.
    ///
    /// This is for convenience so that you can depend on a single crate in your scenarios.
    pub use chaos_lite_core::prelude::*;
    pub use chaos_lite_instruments::prelude::*;
    pub use chaos_lite_summary_model::{EventKind, ReportStore, Round, RoundOutcome, RunSummary};
}
