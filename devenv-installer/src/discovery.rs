use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;
use crate::registry::LocalInstallerRegistry;
use crate::types::InstallerDescriptor;

/// Loads every `*.yaml`/`*.yml` installer descriptor in `dir`, in file name
/// order. Files that cannot be read or parsed are skipped with a warning.
pub fn discover_installers(dir: &Path) -> Result<Vec<InstallerDescriptor>> {
    let mut installers = Vec::new();

    if !dir.exists() {
        debug!(dir = %dir.display(), "installer directory does not exist");
        return Ok(installers);
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if path.is_file() && is_yaml {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        match load_installer(&path) {
            Ok(installer) => installers.push(installer),
            Err(e) => {
                warn!(path = %path.display(), "Failed to load installer: {e:#}");
            }
        }
    }

    Ok(installers)
}

/// Builds a registry from the descriptors found in `dir`.
pub fn registry_from_dir(dir: &Path) -> Result<LocalInstallerRegistry> {
    Ok(LocalInstallerRegistry::new(discover_installers(dir)?))
}

fn load_installer(path: &Path) -> anyhow::Result<InstallerDescriptor> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read installer descriptor: {path:?}"))?;

    let installer: InstallerDescriptor = serde_yaml_ng::from_str(&content)
        .with_context(|| format!("Failed to parse installer descriptor: {path:?}"))?;

    installer.validate()?;
    Ok(installer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InstallerRegistry;
    use tempfile::TempDir;

    fn write(dir: &Path, file: &str, content: &str) {
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_discover_installers_in_directory() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "exec.yaml",
            r#"id: exec
version: 1.0.1
name: Exec
description: Command execution agent
dependencies: [terminal]
properties:
  EXEC_PORT: "4412"
servers:
  exec-agent:
    port: "4412"
    protocol: ws
    path: /connect
"#,
        );
        write(temp.path(), "terminal.yml", "id: terminal\n");
        write(temp.path(), "notes.txt", "id: ignored\n");

        let installers = discover_installers(temp.path()).unwrap();
        assert_eq!(installers.len(), 2);
        assert_eq!(installers[0].id, "exec");
        assert_eq!(installers[0].properties["EXEC_PORT"], "4412");
        assert_eq!(installers[0].servers["exec-agent"].port, "4412");
        assert_eq!(installers[1].id, "terminal");
    }

    #[test]
    fn test_broken_descriptors_are_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "good.yaml", "id: good\n");
        write(temp.path(), "bad.yaml", "id: [not, a, string\n");
        write(temp.path(), "self.yaml", "id: loop\ndependencies: [loop]\n");

        let registry = registry_from_dir(temp.path()).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["good"]);
        assert_eq!(
            registry.ordered_installers(&["good".to_string()]).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let installers = discover_installers(&temp.path().join("absent")).unwrap();
        assert!(installers.is_empty());
    }
}
