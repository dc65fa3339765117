// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "devenv")]
#[command(about = "Provision workspace environments and launch their agents")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a configuration file (default: ~/.devenv/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Parse a container image reference and print it as JSON
    Image {
        /// Image reference (e.g. "registry:5000/team/image:tag")
        reference: String,
    },

    /// Build an environment graph from a recipe and print its start order
    Graph {
        #[command(flatten)]
        recipe: RecipeArgs,

        /// YAML file mapping service names to machine configs
        #[arg(long)]
        machines: Option<PathBuf>,

        /// Fail on depends_on/links references to unknown services
        #[arg(long)]
        strict: bool,
    },

    /// Apply installer configuration to the machines of a recipe
    Provision {
        #[command(flatten)]
        recipe: RecipeArgs,

        /// Directory of installer descriptors (*.yaml, *.yml)
        #[arg(long)]
        installers: PathBuf,

        /// Installers for a machine, e.g. "dev=ws-agent,terminal" (repeatable)
        #[arg(long = "machine", value_parser = parse_machine_installers)]
        machines: Vec<(String, Vec<String>)>,
    },

    /// Print the language server launch key and root for a file
    LaunchKey {
        /// Workspace-relative path or file:// URI
        file: String,

        /// Language id used to pick the launch policy
        #[arg(long)]
        language: Option<String>,
    },

    /// Launch an agent in a running container and wait until it is ready
    LaunchAgent {
        /// YAML agent descriptor
        #[arg(long)]
        agent: PathBuf,

        /// Container to run the agent in
        #[arg(long)]
        container: String,

        /// Server URL of the machine, e.g. "wsagent=http://localhost:4401" (repeatable)
        #[arg(long = "server", value_parser = parse_key_value)]
        servers: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct RecipeArgs {
    /// Recipe location: a path, file:// or http(s):// URL
    pub location: String,

    /// Recipe content type
    #[arg(long, default_value = "application/x-yaml")]
    pub content_type: String,
}

pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

fn parse_machine_installers(s: &str) -> Result<(String, Vec<String>), String> {
    let (machine, ids) = parse_key_value(s)?;
    let ids = ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    Ok((machine, ids))
}
