use std::time::Duration;

use anyhow::{anyhow, Context};
use url::Url;

use crate::descriptor::{AgentDescriptor, MachineHandle};

/// Upper bound for a single health check.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingRequest {
    pub url: Url,
    pub timeout: Duration,
}

/// Health-check request for `agent` running in `machine`: the URL of the
/// agent's server with its health path appended.
pub fn create_ping_request(
    agent: &AgentDescriptor,
    machine: &MachineHandle,
) -> anyhow::Result<PingRequest> {
    let base = machine.servers.get(&agent.server_ref).ok_or_else(|| {
        anyhow!(
            "Machine '{}' does not expose server '{}'",
            machine.name,
            agent.server_ref
        )
    })?;

    let mut url = Url::parse(base)
        .with_context(|| format!("Server '{}' has an invalid URL '{base}'", agent.server_ref))?;
    if url.cannot_be_a_base() {
        return Err(anyhow!(
            "Server '{}' URL '{base}' cannot carry a path",
            agent.server_ref
        ));
    }

    let path = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        agent.health_path.trim_start_matches('/')
    );
    url.set_path(&path);

    Ok(PingRequest {
        url,
        timeout: PING_TIMEOUT.min(agent.max_start_duration()),
    })
}
