use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RootResolutionError {
    #[error("File '{0}' is not inside a project of the workspace")]
    NoProject(String),

    #[error("File '{0}' is outside of the workspace")]
    OutsideWorkspace(String),

    #[error("Workspace root '{0}' is not an absolute path")]
    InvalidWorkspaceRoot(String),

    #[error("Unknown launch policy '{0}', expected per-project or per-workspace")]
    UnknownPolicy(String),
}

pub type Result<T> = std::result::Result<T, RootResolutionError>;
