use anyhow::{Context, Result};
use devenv_config::DevenvConfig;
use devenv_recipe::{
    apply_machine_configs, start_order, validate, DependencyPolicy, MachineConfig,
};
use indexmap::IndexMap;
use std::path::Path;
use tracing::info;

use super::build_graph;
use crate::cli::RecipeArgs;

pub fn handle_graph(
    config: &DevenvConfig,
    recipe: &RecipeArgs,
    machines: Option<&Path>,
    strict: bool,
) -> Result<()> {
    let mut graph = build_graph(config, recipe)?;

    if let Some(path) = machines {
        let machines = load_machines(path)?;
        apply_machine_configs(&mut graph, &machines)?;
    }

    let policy = if strict {
        DependencyPolicy::Strict
    } else {
        config.recipe.dependency_policy
    };
    validate(&graph, policy)?;

    let order = start_order(&graph)?;
    info!(services = graph.len(), "environment is valid");

    println!("# start order: {}", order.join(", "));
    print!("{}", graph.to_yaml()?);
    Ok(())
}

fn load_machines(path: &Path) -> Result<IndexMap<String, MachineConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read machine configs: {path:?}"))?;
    serde_yaml_ng::from_str(&content)
        .with_context(|| format!("Failed to parse machine configs: {path:?}"))
}
