//! Installers discovered from disk applied to a decoded recipe.

use devenv_installer::{
    registry_from_dir, InstallerConfigProvisioner, InstallerDescriptor, InstallerError,
    InstallerRegistry, WORKSPACE_API_ENDPOINT,
};
use devenv_recipe::{EnvironmentGraphBuilder, FileRecipeFetcher, Recipe};
use indexmap::IndexMap;
use std::fs;
use tempfile::TempDir;

const RECIPE: &str = r#"
services:
  dev:
    image: codenvy/ubuntu_jdk8
    environment:
      JAVA_HOME: /opt/jdk
  db:
    image: mysql
"#;

fn write_installers(dir: &std::path::Path) {
    fs::write(
        dir.join("terminal.yaml"),
        "id: terminal\nproperties:\n  TERM_PORT: \"4411\"\n  MODE: terminal\n",
    )
    .unwrap();
    fs::write(
        dir.join("ws-agent.yaml"),
        r#"id: ws-agent
dependencies: [terminal]
properties:
  MODE: agent
servers:
  wsagent:
    port: "4401"
    protocol: http
    path: /api
"#,
    )
    .unwrap();
}

#[test]
fn installers_from_directory_provision_graph() {
    let temp = TempDir::new().unwrap();
    write_installers(temp.path());
    let registry = registry_from_dir(temp.path()).unwrap();

    let mut graph = EnvironmentGraphBuilder::new(FileRecipeFetcher::new())
        .build(&Recipe::inline("text/x-yaml", RECIPE))
        .unwrap();

    let mut request = IndexMap::new();
    request.insert("dev".to_string(), vec!["ws-agent".to_string()]);
    request.insert("db".to_string(), vec!["unknown".to_string()]);

    let report = InstallerConfigProvisioner::new("control-plane:8080").provision(
        &mut graph.services,
        &request,
        &registry,
    );

    let dev = graph.service("dev").unwrap();
    assert_eq!(dev.environment["JAVA_HOME"], "/opt/jdk");
    assert_eq!(dev.environment["TERM_PORT"], "4411");
    assert_eq!(dev.environment["MODE"], "agent");
    assert_eq!(dev.environment[WORKSPACE_API_ENDPOINT], "control-plane:8080");
    assert!(dev.exposed_ports.contains("4401/tcp"));

    let db = graph.service("db").unwrap();
    assert!(!db.environment.contains_key(WORKSPACE_API_ENDPOINT));

    assert_eq!(report.provisioned, vec!["dev"]);
    match report.into_result() {
        Err(InstallerError::ProvisionFailures { failures }) => {
            assert_eq!(failures.keys().collect::<Vec<_>>(), vec!["db"]);
        }
        other => panic!("expected aggregated failures, got {other:?}"),
    }
}

struct FailingRegistry;

impl InstallerRegistry for FailingRegistry {
    fn ordered_installers(
        &self,
        ids: &[String],
    ) -> devenv_installer::Result<Vec<InstallerDescriptor>> {
        Err(InstallerError::DependencyCycle { ids: ids.to_vec() })
    }
}

#[test]
fn custom_registry_failures_are_wrapped() {
    let mut graph = EnvironmentGraphBuilder::new(FileRecipeFetcher::new())
        .build(&Recipe::inline("text/yaml", RECIPE))
        .unwrap();
    let request = IndexMap::from([("dev".to_string(), vec!["a".to_string()])]);

    let report =
        InstallerConfigProvisioner::new("api").provision(&mut graph.services, &request, &FailingRegistry);

    match &report.failures["dev"] {
        InstallerError::InstallerResolution { machine, source } => {
            assert_eq!(machine, "dev");
            assert!(matches!(**source, InstallerError::DependencyCycle { .. }));
        }
        other => panic!("unexpected failure {other:?}"),
    }
    assert_eq!(graph.service("dev").unwrap().environment.len(), 1);
}
