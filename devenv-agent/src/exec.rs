//! Machine execution and health-check collaborators.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing::debug;

use crate::descriptor::MachineHandle;
use crate::ping::PingRequest;

/// Runs a script inside a machine without waiting for it to finish.
#[async_trait::async_trait]
pub trait MachineExecutor: Send + Sync {
    async fn exec(&self, machine: &MachineHandle, script: &str) -> anyhow::Result<()>;
}

/// Issues a health check and reports the HTTP status code.
#[async_trait::async_trait]
pub trait HealthPinger: Send + Sync {
    async fn ping(&self, request: &PingRequest) -> anyhow::Result<u16>;
}

/// Runs scripts with `docker exec -d`.
pub struct DockerExecutor {
    docker: PathBuf,
}

impl DockerExecutor {
    pub fn new() -> anyhow::Result<Self> {
        let docker = which::which("docker").context("Docker CLI not found in PATH")?;
        Ok(Self { docker })
    }

    pub fn with_binary(docker: impl Into<PathBuf>) -> Self {
        Self {
            docker: docker.into(),
        }
    }
}

#[async_trait::async_trait]
impl MachineExecutor for DockerExecutor {
    async fn exec(&self, machine: &MachineHandle, script: &str) -> anyhow::Result<()> {
        debug!(machine = %machine.name, container = %machine.container, "submitting agent script");
        let output = tokio::process::Command::new(&self.docker)
            .args(["exec", "-d", &machine.container, "sh", "-c", script])
            .output()
            .await
            .with_context(|| format!("Failed to run docker exec in '{}'", machine.container))?;

        if !output.status.success() {
            bail!(
                "docker exec in '{}' failed: {}",
                machine.container,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// HTTP GET health checks.
#[derive(Default)]
pub struct HttpPinger {
    client: reqwest::Client,
}

impl HttpPinger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl HealthPinger for HttpPinger {
    async fn ping(&self, request: &PingRequest) -> anyhow::Result<u16> {
        let response = self
            .client
            .get(request.url.clone())
            .timeout(request.timeout)
            .send()
            .await
            .with_context(|| format!("Health check of {} failed", request.url))?;
        Ok(response.status().as_u16())
    }
}
