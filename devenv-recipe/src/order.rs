//! Start ordering of services.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};

use crate::environment::EnvironmentGraph;
use crate::error::{RecipeError, Result};

/// Service names ordered so that every dependency starts before its
/// dependents. Services without ordering constraints keep document order.
pub fn start_order(graph: &EnvironmentGraph) -> Result<Vec<String>> {
    // service -> services depending on it
    let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
    let mut in_degree: IndexMap<&str, usize> = IndexMap::new();

    for (name, service) in &graph.services {
        in_degree.entry(name.as_str()).or_insert(0);
        let targets: IndexSet<&str> = service
            .dependencies()
            .filter(|target| graph.service(target).is_some())
            .collect();
        for target in targets {
            dependents.entry(target).or_default().push(name.as_str());
            *in_degree.entry(name.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(name) = ready.pop_front() {
        order.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*dependent);
                }
            }
        }
    }

    if order.len() < graph.len() {
        let services = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        return Err(RecipeError::UnresolvableStartOrder { services });
    }

    Ok(order)
}
