use clap::Parser;
use env_logger::Env;

use crate::cli::ChaosLiteCli;

/// Initialise the CLI and logging for the chaos runner.
///
/// Logging defaults to `info` when `RUST_LOG` is not set.
pub fn init() -> ChaosLiteCli {
    // A logger may already be installed by the embedding binary.
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();

    ChaosLiteCli::parse()
}
