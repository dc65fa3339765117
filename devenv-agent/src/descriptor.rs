use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

pub const DEFAULT_MAX_START_DURATION_MS: u64 = 120_000;
pub const DEFAULT_POLL_DELAY_MS: u64 = 2_000;

/// An agent to start inside a machine, and how to tell that it is up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,

    /// Installation text run ahead of `run_command`.
    #[serde(default)]
    pub script: String,

    pub run_command: String,

    /// Machine server the agent listens on.
    pub server_ref: String,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_start_duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_message: Option<String>,
}

fn default_health_path() -> String {
    "/".to_string()
}

impl AgentDescriptor {
    pub fn new(
        id: impl Into<String>,
        run_command: impl Into<String>,
        server_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            machine_type: None,
            script: String::new(),
            run_command: run_command.into(),
            server_ref: server_ref.into(),
            health_path: default_health_path(),
            max_start_duration_ms: None,
            poll_delay_ms: None,
            timeout_message: None,
        }
    }

    /// Load a descriptor from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read agent descriptor: {path:?}"))?;
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse agent descriptor: {path:?}"))
    }

    /// Fill in durations the descriptor does not set itself.
    pub fn with_default_timings(mut self, max_start_duration_ms: u64, poll_delay_ms: u64) -> Self {
        self.max_start_duration_ms.get_or_insert(max_start_duration_ms);
        self.poll_delay_ms.get_or_insert(poll_delay_ms);
        self
    }

    pub fn max_start_duration(&self) -> Duration {
        Duration::from_millis(
            self.max_start_duration_ms
                .unwrap_or(DEFAULT_MAX_START_DURATION_MS),
        )
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms.unwrap_or(DEFAULT_POLL_DELAY_MS))
    }

    /// Script submitted to the machine: the installation text followed by
    /// the run command.
    pub fn startup_script(&self) -> String {
        format!("{}\n{}", self.script, self.run_command)
    }

    pub fn timeout_message(&self) -> String {
        self.timeout_message.clone().unwrap_or_else(|| {
            format!(
                "Agent '{}' did not start within {} ms",
                self.id,
                self.max_start_duration().as_millis()
            )
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AgentError::InvalidDescriptor(
                "agent id must not be empty".into(),
            ));
        }
        if self.run_command.trim().is_empty() {
            return Err(AgentError::InvalidDescriptor(format!(
                "agent '{}' has no run command",
                self.id
            )));
        }
        if self.max_start_duration().is_zero() {
            return Err(AgentError::InvalidDescriptor(format!(
                "agent '{}': max start duration must be positive",
                self.id
            )));
        }
        if self.poll_delay().is_zero() {
            return Err(AgentError::InvalidDescriptor(format!(
                "agent '{}': poll delay must be positive",
                self.id
            )));
        }
        Ok(())
    }
}

/// A running machine an agent is launched into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineHandle {
    pub id: String,
    pub name: String,
    /// Container the machine runs in.
    pub container: String,
    /// Server reference to externally reachable base URL.
    #[serde(default)]
    pub servers: IndexMap<String, String>,
}

impl MachineHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            container: container.into(),
            servers: IndexMap::new(),
        }
    }

    pub fn with_server(mut self, reference: impl Into<String>, url: impl Into<String>) -> Self {
        self.servers.insert(reference.into(), url.into());
        self
    }
}
