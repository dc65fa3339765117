use anyhow::{Context, Result};
use devenv_config::DevenvConfig;
use devenv_installer::{registry_from_dir, InstallerConfigProvisioner};
use indexmap::IndexMap;
use std::path::Path;

use super::build_graph;
use crate::cli::RecipeArgs;

pub fn handle_provision(
    config: &DevenvConfig,
    recipe: &RecipeArgs,
    installers_dir: &Path,
    machines: Vec<(String, Vec<String>)>,
) -> Result<()> {
    let mut graph = build_graph(config, recipe)?;
    let registry = registry_from_dir(installers_dir)
        .with_context(|| format!("Failed to load installers from {installers_dir:?}"))?;

    let installers_by_machine: IndexMap<String, Vec<String>> = machines.into_iter().collect();
    let report = InstallerConfigProvisioner::new(&config.api_endpoint).provision(
        &mut graph.services,
        &installers_by_machine,
        &registry,
    );

    let environments: IndexMap<&str, &IndexMap<String, String>> = graph
        .services
        .iter()
        .map(|(name, service)| (name.as_str(), &service.environment))
        .collect();
    print!("{}", serde_yaml_ng::to_string(&environments)?);

    report.into_result()?;
    Ok(())
}
