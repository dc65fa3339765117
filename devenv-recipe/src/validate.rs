//! Structural checks on an environment graph.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::environment::EnvironmentGraph;
use crate::error::{RecipeError, Result};

static SERVICE_NAME_RE: OnceLock<Regex> = OnceLock::new();
static PORT_RE: OnceLock<Regex> = OnceLock::new();

fn service_name_regex() -> &'static Regex {
    SERVICE_NAME_RE
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("service name pattern is valid"))
}

fn port_regex() -> &'static Regex {
    PORT_RE.get_or_init(|| Regex::new(r"^([0-9]{1,5})(?:/(tcp|udp))?$").expect("port pattern is valid"))
}

/// How references to services absent from the graph are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPolicy {
    /// Log a warning and carry on.
    #[default]
    Lenient,
    /// Fail with [`RecipeError::DanglingDependency`].
    Strict,
}

pub fn validate(graph: &EnvironmentGraph, policy: DependencyPolicy) -> Result<()> {
    if graph.is_empty() {
        return Err(RecipeError::InvalidEnvironment(
            "Environment should contain at least 1 machine".into(),
        ));
    }

    for (name, service) in &graph.services {
        if !service_name_regex().is_match(name) {
            return Err(RecipeError::InvalidEnvironment(format!(
                "Name of machine '{name}' in environment is invalid"
            )));
        }

        if service.image.as_deref().map_or(true, str::is_empty) && service.build.is_none() {
            return Err(RecipeError::InvalidEnvironment(format!(
                "Field 'image' or 'build.context' is required in machine '{name}'"
            )));
        }

        if service.environment.keys().any(|key| key.trim().is_empty()) {
            return Err(RecipeError::InvalidEnvironment(format!(
                "Machine '{name}' contains environment variable with empty name"
            )));
        }

        for port in &service.exposed_ports {
            if !is_valid_port(port) {
                return Err(RecipeError::InvalidEnvironment(format!(
                    "Exposed port '{port}' in machine '{name}' is invalid"
                )));
            }
        }

        for target in service.dependencies() {
            if graph.service(target).is_some() {
                continue;
            }
            match policy {
                DependencyPolicy::Strict => {
                    return Err(RecipeError::DanglingDependency {
                        service: name.clone(),
                        target: target.to_string(),
                    })
                }
                DependencyPolicy::Lenient => {
                    warn!(service = %name, target, "service references unknown service")
                }
            }
        }
    }

    Ok(())
}

fn is_valid_port(port: &str) -> bool {
    port_regex()
        .captures(port)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .is_some_and(|number| (1..=65535).contains(&number))
}
