//! Policies deciding which language server instance serves a file.
//!
//! Two files share an instance exactly when they map to the same launch key,
//! so `is_applicable(launch_key(a), b)` holds iff `launch_key(b) == launch_key(a)`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RootResolutionError};
use crate::paths::WorkspacePaths;

pub trait LaunchStrategy: Send + Sync {
    /// Key of the instance serving `file_uri`.
    ///
    /// Per-project keys are the project directory name. A file outside the
    /// workspace gets the empty key, which is also the per-workspace key;
    /// `root_uri` reports such files as `OutsideWorkspace` and files with no
    /// project as `NoProject`.
    fn launch_key(&self, file_uri: &str) -> String;

    /// `file://` URI of the directory the instance serving `file_uri` is rooted at.
    fn root_uri(&self, file_uri: &str) -> Result<String>;

    fn is_applicable(&self, launch_key: &str, file_uri: &str) -> bool;
}

/// One instance per top-level project directory.
#[derive(Debug, Clone)]
pub struct PerProjectStrategy {
    paths: WorkspacePaths,
}

impl PerProjectStrategy {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            paths: WorkspacePaths::new(workspace_root),
        }
    }

    fn project(&self, file_uri: &str) -> Option<String> {
        self.paths
            .segments(file_uri)
            .and_then(|segments| segments.into_iter().next())
    }
}

impl LaunchStrategy for PerProjectStrategy {
    fn launch_key(&self, file_uri: &str) -> String {
        self.project(file_uri).unwrap_or_default()
    }

    fn root_uri(&self, file_uri: &str) -> Result<String> {
        let segments = self
            .paths
            .segments(file_uri)
            .ok_or_else(|| RootResolutionError::OutsideWorkspace(file_uri.to_string()))?;

        // A file directly under the workspace root belongs to no project.
        if segments.len() < 2 {
            return Err(RootResolutionError::NoProject(file_uri.to_string()));
        }

        let root = self.paths.root_uri(Path::new(&segments[0]))?;
        debug!(file = file_uri, root = %root, "resolved project root");
        Ok(root)
    }

    fn is_applicable(&self, launch_key: &str, file_uri: &str) -> bool {
        self.launch_key(file_uri) == launch_key
    }
}

/// A single instance for the whole workspace.
#[derive(Debug, Clone)]
pub struct PerWorkspaceStrategy {
    paths: WorkspacePaths,
}

impl PerWorkspaceStrategy {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            paths: WorkspacePaths::new(workspace_root),
        }
    }
}

impl LaunchStrategy for PerWorkspaceStrategy {
    fn launch_key(&self, _file_uri: &str) -> String {
        String::new()
    }

    fn root_uri(&self, _file_uri: &str) -> Result<String> {
        self.paths.root_uri(Path::new(""))
    }

    fn is_applicable(&self, _launch_key: &str, _file_uri: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchPolicy {
    #[default]
    PerProject,
    PerWorkspace,
}

impl fmt::Display for LaunchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchPolicy::PerProject => f.write_str("per-project"),
            LaunchPolicy::PerWorkspace => f.write_str("per-workspace"),
        }
    }
}

impl FromStr for LaunchPolicy {
    type Err = RootResolutionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "per-project" => Ok(LaunchPolicy::PerProject),
            "per-workspace" => Ok(LaunchPolicy::PerWorkspace),
            other => Err(RootResolutionError::UnknownPolicy(other.to_string())),
        }
    }
}

pub fn strategy_for(
    policy: LaunchPolicy,
    workspace_root: impl Into<PathBuf>,
) -> Box<dyn LaunchStrategy> {
    match policy {
        LaunchPolicy::PerProject => Box::new(PerProjectStrategy::new(workspace_root)),
        LaunchPolicy::PerWorkspace => Box::new(PerWorkspaceStrategy::new(workspace_root)),
    }
}
