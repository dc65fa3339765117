use std::path::{Path, PathBuf};

use devenv_lsp::LaunchPolicy;
use devenv_recipe::DependencyPolicy;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

pub const API_ENDPOINT_ENV: &str = "DEVENV_API_ENDPOINT";
pub const WORKSPACE_ROOT_ENV: &str = "DEVENV_WORKSPACE_ROOT";

/// Root structure of `~/.devenv/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevenvConfig {
    /// Externally reachable control-plane endpoint handed to agents
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    /// Directory holding the workspace projects
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    #[serde(default, skip_serializing_if = "AgentSettings::is_default")]
    pub agents: AgentSettings,

    #[serde(default, skip_serializing_if = "RecipeSettings::is_default")]
    pub recipe: RecipeSettings,

    /// Launch policy per language id
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub language_servers: IndexMap<String, LaunchPolicy>,

    #[serde(default)]
    pub default_launch_policy: LaunchPolicy,
}

fn default_api_endpoint() -> String {
    "localhost:8080".to_string()
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("/projects")
}

impl Default for DevenvConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            workspace_root: default_workspace_root(),
            agents: AgentSettings::default(),
            recipe: RecipeSettings::default(),
            language_servers: IndexMap::new(),
            default_launch_policy: LaunchPolicy::default(),
        }
    }
}

/// Defaults for agent descriptors that do not set their own timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_start_duration_ms")]
    pub max_start_duration_ms: u64,

    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
}

fn default_max_start_duration_ms() -> u64 {
    120_000
}

fn default_poll_delay_ms() -> u64 {
    2_000
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_start_duration_ms: default_max_start_duration_ms(),
            poll_delay_ms: default_poll_delay_ms(),
        }
    }
}

impl AgentSettings {
    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSettings {
    #[serde(default)]
    pub dependency_policy: DependencyPolicy,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for RecipeSettings {
    fn default() -> Self {
        Self {
            dependency_policy: DependencyPolicy::default(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl RecipeSettings {
    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

impl DevenvConfig {
    /// Path of the user configuration file.
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".devenv").join("config.yaml"))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Load the user configuration with environment overrides applied.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path()?)
    }

    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist. Environment overrides are applied and the result is
    /// validated.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_yaml_ng::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let yaml = serde_yaml_ng::to_string(self)?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(endpoint) = non_empty_env(API_ENDPOINT_ENV) {
            self.api_endpoint = endpoint;
        }
        if let Some(root) = non_empty_env(WORKSPACE_ROOT_ENV) {
            self.workspace_root = PathBuf::from(root);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("api_endpoint must not be empty".into()));
        }
        if self.agents.max_start_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "agents.max_start_duration_ms must be positive".into(),
            ));
        }
        if self.agents.poll_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "agents.poll_delay_ms must be positive".into(),
            ));
        }
        if self.recipe.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "recipe.fetch_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Launch policy configured for `language`.
    pub fn launch_policy(&self, language: Option<&str>) -> LaunchPolicy {
        language
            .and_then(|language| self.language_servers.get(language))
            .copied()
            .unwrap_or(self.default_launch_policy)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
