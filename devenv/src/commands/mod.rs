// Command handlers

use anyhow::{Context, Result};
use devenv_config::DevenvConfig;
use devenv_recipe::{EnvironmentGraph, EnvironmentGraphBuilder, Recipe, UrlRecipeFetcher};
use std::time::Duration;
use tracing::debug;

use crate::cli::{Args, Command, RecipeArgs};

pub mod graph;
pub mod image;
pub mod launch_agent;
pub mod launch_key;
pub mod provision;

/// Main command dispatcher
pub fn execute_command(args: Args) -> Result<()> {
    match args.command {
        Command::Image { reference } => image::handle_image(&reference),
        Command::Graph {
            recipe,
            machines,
            strict,
        } => {
            let config = load_config(&args.config)?;
            graph::handle_graph(&config, &recipe, machines.as_deref(), strict)
        }
        Command::Provision {
            recipe,
            installers,
            machines,
        } => {
            let config = load_config(&args.config)?;
            provision::handle_provision(&config, &recipe, &installers, machines)
        }
        Command::LaunchKey { file, language } => {
            let config = load_config(&args.config)?;
            launch_key::handle_launch_key(&config, &file, language.as_deref())
        }
        Command::LaunchAgent {
            agent,
            container,
            servers,
        } => {
            let config = load_config(&args.config)?;
            launch_agent::handle_launch_agent(&config, &agent, &container, servers)
        }
    }
}

fn load_config(path: &Option<std::path::PathBuf>) -> Result<DevenvConfig> {
    let config = match path {
        Some(path) => DevenvConfig::load_from_path(path),
        None => DevenvConfig::load(),
    }
    .context("Failed to load devenv configuration")?;
    debug!(api_endpoint = %config.api_endpoint, "loaded configuration");
    Ok(config)
}

/// Fetches and decodes the recipe named on the command line.
pub(crate) fn build_graph(config: &DevenvConfig, recipe: &RecipeArgs) -> Result<EnvironmentGraph> {
    let fetcher =
        UrlRecipeFetcher::with_timeout(Duration::from_secs(config.recipe.fetch_timeout_secs))?;
    let graph = EnvironmentGraphBuilder::new(fetcher)
        .build(&Recipe::located(&recipe.content_type, &recipe.location))
        .with_context(|| format!("Failed to build environment from '{}'", recipe.location))?;
    Ok(graph)
}
