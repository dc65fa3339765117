//! Agent launching for workspace machines.
//!
//! An [`AgentLauncher`] submits an agent's startup script through a
//! [`MachineExecutor`] and polls its health endpoint through a
//! [`HealthPinger`] until it is ready, the start budget runs out, or the
//! launch is cancelled.

pub mod descriptor;
pub mod error;
pub mod exec;
pub mod launcher;
pub mod ping;
pub mod state;

pub use descriptor::{AgentDescriptor, MachineHandle};
pub use error::{AgentError, Result};
pub use exec::{DockerExecutor, HealthPinger, HttpPinger, MachineExecutor};
pub use launcher::{AgentLauncher, LaunchHandle};
pub use ping::{create_ping_request, PingRequest};
pub use state::{Cancellation, LaunchState};
