//! Container runtime collaborator.
//!
//! Everything goes through `docker compose` against one compose file:
//! bringing the stack up, pausing/resuming a single service (used as the
//! restore window), and exec-ing the database tooling inside its
//! container. The trait is the seam the orchestrator and restore manager
//! are tested through.

use crate::errors::DeployError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

/// Start/stop/list containers by service name.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Bring the whole stack up (detached). Idempotent for services that
    /// are already running.
    async fn up(&self) -> Result<(), DeployError>;

    /// Start one named service.
    async fn start(&self, service: &str) -> Result<(), DeployError>;

    /// Stop one named service.
    async fn stop(&self, service: &str) -> Result<(), DeployError>;

    /// Whether the named service has a running container.
    async fn is_running(&self, service: &str) -> Result<bool, DeployError>;
}

/// `docker compose` driver for the stack.
#[derive(Debug, Clone)]
pub struct DockerCompose {
    compose_file: PathBuf,
}

impl DockerCompose {
    pub fn new(compose_file: impl Into<PathBuf>) -> Self {
        Self {
            compose_file: compose_file.into(),
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new("docker");
        cmd.arg("compose").arg("-f").arg(&self.compose_file);
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<Output, DeployError> {
        debug!("docker compose {}", args.join(" "));
        let output = self
            .base_command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DeployError::Runtime(format!("failed to run docker compose: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Runtime(format!(
                "docker compose {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }
        Ok(output)
    }

    /// Exec a command inside a service container, optionally with extra
    /// environment and a file piped to stdin. `-T` keeps it non-TTY so
    /// output can be captured.
    pub async fn exec(
        &self,
        service: &str,
        env: &[(&str, &str)],
        command: &[&str],
        stdin: Option<std::fs::File>,
    ) -> Result<Output, DeployError> {
        let mut cmd = self.base_command();
        cmd.arg("exec").arg("-T");
        for (key, value) in env {
            cmd.arg("-e").arg(format!("{}={}", key, value));
        }
        cmd.arg(service).args(command);

        match stdin {
            Some(file) => cmd.stdin(Stdio::from(file)),
            None => cmd.stdin(Stdio::null()),
        };

        debug!("docker compose exec {} {}", service, command.join(" "));
        cmd.output()
            .await
            .map_err(|e| DeployError::Runtime(format!("failed to exec in {}: {}", service, e)))
    }
}

#[async_trait]
impl ContainerRuntime for DockerCompose {
    async fn up(&self) -> Result<(), DeployError> {
        info!("[DOCKER] bringing stack up");
        self.run(&["up", "-d"]).await?;
        Ok(())
    }

    async fn start(&self, service: &str) -> Result<(), DeployError> {
        info!("[DOCKER] starting {}", service);
        self.run(&["start", service]).await?;
        Ok(())
    }

    async fn stop(&self, service: &str) -> Result<(), DeployError> {
        info!("[DOCKER] stopping {}", service);
        self.run(&["stop", service]).await?;
        Ok(())
    }

    async fn is_running(&self, service: &str) -> Result<bool, DeployError> {
        let output = self
            .run(&["ps", "--services", "--filter", "status=running"])
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().any(|line| line.trim() == service))
    }
}
