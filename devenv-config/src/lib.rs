//! Configuration for the devenv tool.
//!
//! Settings live in `~/.devenv/config.yaml`. A missing file means defaults;
//! `DEVENV_API_ENDPOINT` and `DEVENV_WORKSPACE_ROOT` override the file.

pub mod config;
pub mod error;


pub use config::{AgentSettings, DevenvConfig, RecipeSettings};
pub use error::{ConfigError, Result};
