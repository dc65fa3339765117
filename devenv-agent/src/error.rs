use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to launch agent '{agent}': {source}")]
    LaunchFailed {
        agent: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{message}")]
    TimedOut { agent: String, message: String },

    #[error("Launch of agent '{agent}' was interrupted")]
    Interrupted { agent: String },

    #[error("Invalid agent descriptor: {0}")]
    InvalidDescriptor(String),
}

impl AgentError {
    pub(crate) fn launch_failed(agent: &str, source: anyhow::Error) -> Self {
        AgentError::LaunchFailed {
            agent: agent.to_string(),
            source,
        }
    }
}
