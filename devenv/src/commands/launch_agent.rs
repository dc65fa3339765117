use anyhow::{Context, Result};
use devenv_agent::{
    AgentDescriptor, AgentLauncher, Cancellation, DockerExecutor, HttpPinger, LaunchState,
    MachineHandle,
};
use devenv_config::DevenvConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub fn handle_launch_agent(
    config: &DevenvConfig,
    agent_path: &Path,
    container: &str,
    servers: Vec<(String, String)>,
) -> Result<()> {
    let agent = AgentDescriptor::load(agent_path)?.with_default_timings(
        config.agents.max_start_duration_ms,
        config.agents.poll_delay_ms,
    );
    agent.validate()?;

    let mut machine = MachineHandle::new(container, container, container);
    machine.servers.extend(servers);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(launch(agent, machine))
}

async fn launch(agent: AgentDescriptor, machine: MachineHandle) -> Result<()> {
    let launcher = AgentLauncher::new(Arc::new(DockerExecutor::new()?), Arc::new(HttpPinger::new()));
    let cancellation = Cancellation::new();
    let agent_id = agent.id.clone();
    let handle = launcher.spawn_with(agent, machine, cancellation.clone());

    let mut states = handle.subscribe();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!(agent = %agent_id, %state, "launch state changed");
            if state.is_terminal() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling agent launch");
            cancellation.cancel();
        }
    });

    handle.wait().await?;
    println!("{}", LaunchState::Ready);
    Ok(())
}
