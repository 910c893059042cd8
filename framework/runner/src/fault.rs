use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use async_trait::async_trait;

use crate::types::ChaosLiteResult;

/// Disrupts and restores the target's running instance.
///
/// Both operations are best effort. Returning says nothing about whether the target is actually
/// down or up, that is only ever established by probing its health.
#[async_trait]
pub trait FaultDriver: Send + Sync {
    async fn disrupt(&self, target: &str);

    async fn restore(&self, target: &str);
}

/// Environment variable to override the path to the Docker CLI used to kill and start containers.
pub const CHAOS_DOCKER_PATH_ENV: &str = "CHAOS_DOCKER_PATH";

/// Get the path to the Docker CLI.
///
/// If the [`CHAOS_DOCKER_PATH_ENV`] environment variable is set, its value is used as the path to
/// the Docker CLI. If it is not set, `docker` is looked up in the system's PATH.
pub fn docker_path() -> ChaosLiteResult<PathBuf> {
    resolve_docker_path(env::var(CHAOS_DOCKER_PATH_ENV).ok().as_deref())
}

fn resolve_docker_path(configured: Option<&str>) -> ChaosLiteResult<PathBuf> {
    match configured {
        Some("") => {
            bail!("'{CHAOS_DOCKER_PATH_ENV}' set to empty string");
        }
        Some("docker") | None => which::which("docker").with_context(|| {
            format!(
                "Docker CLI not found in PATH. Please install Docker or set '{CHAOS_DOCKER_PATH_ENV}' to the correct path."
            )
        }),
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.is_file() {
                bail!(
                    "'{CHAOS_DOCKER_PATH_ENV}' is set to '{}' but that is not a file",
                    path.display()
                );
            }
            Ok(path)
        }
    }
}

/// Kills and starts containers through the Docker CLI.
///
/// Restoring relies on `docker start`. A container with a restart policy may already be coming
/// back by the time it is issued, in which case it does nothing.
#[derive(Debug, Clone)]
pub struct DockerFaultDriver {
    docker: PathBuf,
}

impl DockerFaultDriver {
    pub fn new(docker: PathBuf) -> Self {
        Self { docker }
    }

    /// Use the Docker CLI found by [docker_path].
    pub fn from_env() -> ChaosLiteResult<Self> {
        Ok(Self::new(docker_path()?))
    }

    async fn docker(&self, verb: &str, target: &str) {
        let output = tokio::process::Command::new(&self.docker)
            .arg(verb)
            .arg(target)
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                log::debug!("docker {verb} {target} finished with status: {}", output.status);
            }
            Ok(output) => {
                log::warn!(
                    "docker {verb} {target} failed with status {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(e) => {
                log::warn!("Failed to run {} {verb} {target}: {e}", self.docker.display());
            }
        }
    }
}

#[async_trait]
impl FaultDriver for DockerFaultDriver {
    async fn disrupt(&self, target: &str) {
        log::info!("docker kill {target}");
        self.docker("kill", target).await;
    }

    async fn restore(&self, target: &str) {
        log::info!("Ensuring {target} is up");
        self.docker("start", target).await;
    }
}
