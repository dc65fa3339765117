//! Installer lookup and dependency ordering.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::{InstallerError, Result};
use crate::types::InstallerDescriptor;

pub trait InstallerRegistry {
    /// Expand `ids` with their transitive dependencies and order the result
    /// so that every installer comes after the ones it depends on.
    fn ordered_installers(&self, ids: &[String]) -> Result<Vec<InstallerDescriptor>>;
}

/// In-memory registry keyed by installer id.
#[derive(Debug, Clone, Default)]
pub struct LocalInstallerRegistry {
    installers: IndexMap<String, InstallerDescriptor>,
}

impl LocalInstallerRegistry {
    pub fn new(installers: impl IntoIterator<Item = InstallerDescriptor>) -> Self {
        let mut registry = Self::default();
        for installer in installers {
            registry.add(installer);
        }
        registry
    }

    /// Registers `installer`, replacing any previous one with the same id.
    pub fn add(&mut self, installer: InstallerDescriptor) {
        self.installers.insert(installer.id.clone(), installer);
    }

    pub fn get(&self, id: &str) -> Result<&InstallerDescriptor> {
        self.installers
            .get(id)
            .ok_or_else(|| InstallerError::UnknownInstaller(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.installers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.installers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installers.is_empty()
    }

    // Requested ids plus everything they depend on, in discovery order.
    fn closure(&self, ids: &[String]) -> Result<IndexSet<&str>> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        let mut pending: VecDeque<&str> = ids.iter().map(String::as_str).collect();

        while let Some(id) = pending.pop_front() {
            if seen.contains(id) {
                continue;
            }
            let installer = self.get(id)?;
            seen.insert(installer.id.as_str());
            pending.extend(installer.dependencies.iter().map(String::as_str));
        }
        Ok(seen)
    }
}

impl InstallerRegistry for LocalInstallerRegistry {
    fn ordered_installers(&self, ids: &[String]) -> Result<Vec<InstallerDescriptor>> {
        let members = self.closure(ids)?;

        let mut in_degree: IndexMap<&str, usize> = members.iter().map(|id| (*id, 0)).collect();
        let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for id in &members {
            let installer = self.get(id)?;
            let dependencies: IndexSet<&str> =
                installer.dependencies.iter().map(String::as_str).collect();
            for dependency in dependencies {
                dependents.entry(dependency).or_default().push(*id);
                if let Some(degree) = in_degree.get_mut(id) {
                    *degree += 1;
                }
            }
        }

        let mut ready: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut ordered = Vec::with_capacity(members.len());

        while let Some(id) = ready.pop_front() {
            ordered.push(self.get(id)?.clone());
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }

        if ordered.len() < members.len() {
            let ids = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(InstallerError::DependencyCycle { ids });
        }

        debug!(
            requested = ids.len(),
            resolved = ordered.len(),
            "resolved installer order"
        );
        Ok(ordered)
    }
}
