//! Per-machine configuration applied on top of a decoded recipe.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::environment::{normalize_port, EnvironmentGraph, ServiceSpec};
use crate::error::{RecipeError, Result};

pub const SERVER_LABEL_PREFIX: &str = "dev.workspace.server.";
pub const MEMORY_LIMIT_ATTRIBUTE: &str = "memoryLimitBytes";

static PROTOCOL_RE: OnceLock<Regex> = OnceLock::new();

/// URI scheme syntax: a letter followed by letters, digits, `+`, `-` or `.`.
fn protocol_regex() -> &'static Regex {
    PROTOCOL_RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*$").expect("protocol pattern is valid")
    })
}

/// A server a machine exposes, e.g. the workspace agent's HTTP port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `8080` or `8080/udp`.
    pub port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ServerConfig {
    pub fn normalized_port(&self) -> String {
        normalize_port(&self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    #[serde(default)]
    pub servers: IndexMap<String, ServerConfig>,
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
    #[serde(default)]
    pub installers: Vec<String>,
}

/// Exposes each server's port on `service` and records it in labels.
pub fn apply_servers(service: &mut ServiceSpec, servers: &IndexMap<String, ServerConfig>) {
    for (reference, server) in servers {
        let port = server.normalized_port();
        let prefix = format!("{SERVER_LABEL_PREFIX}{port}");

        service
            .labels
            .insert(format!("{prefix}.ref"), reference.clone());
        if let Some(protocol) = &server.protocol {
            service
                .labels
                .insert(format!("{prefix}.protocol"), protocol.clone());
        }
        if let Some(path) = &server.path {
            service.labels.insert(format!("{prefix}.path"), path.clone());
        }
        service.exposed_ports.insert(port);
    }
}

/// Applies machine configs keyed by service name to the graph.
pub fn apply_machine_configs(
    graph: &mut EnvironmentGraph,
    machines: &IndexMap<String, MachineConfig>,
) -> Result<()> {
    for (name, config) in machines {
        let service = graph.service_mut(name).ok_or_else(|| {
            RecipeError::InvalidEnvironment(format!(
                "Machine '{name}' is configured but missing in the recipe"
            ))
        })?;

        for (reference, server) in &config.servers {
            if let Some(protocol) = &server.protocol {
                if !protocol_regex().is_match(protocol) {
                    return Err(RecipeError::InvalidEnvironment(format!(
                        "Machine '{name}' contains server conf '{reference}' with invalid protocol '{protocol}'"
                    )));
                }
            }
        }
        apply_servers(service, &config.servers);

        if let Some(raw) = config.attributes.get(MEMORY_LIMIT_ATTRIBUTE) {
            let limit = raw.trim().parse::<u64>().map_err(|_| {
                RecipeError::InvalidEnvironment(format!(
                    "Value of attribute '{MEMORY_LIMIT_ATTRIBUTE}' of machine '{name}' is illegal: '{raw}'"
                ))
            })?;
            service.memory_limit_bytes = Some(limit);
        }

        debug!(machine = %name, servers = config.servers.len(), "applied machine config");
    }
    Ok(())
}
