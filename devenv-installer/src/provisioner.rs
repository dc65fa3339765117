//! Injects installer-provided configuration into container specs.

use devenv_recipe::{apply_servers, ServiceSpec};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::error::{InstallerError, Result};
use crate::registry::InstallerRegistry;

/// Environment variable carrying the externally reachable API endpoint.
pub const WORKSPACE_API_ENDPOINT: &str = "WORKSPACE_API_ENDPOINT";

/// Outcome of a provisioning batch.
#[derive(Debug, Default)]
pub struct ProvisionReport {
    /// Machines whose specs were updated, in request order.
    pub provisioned: Vec<String>,
    pub failures: IndexMap<String, InstallerError>,
}

impl ProvisionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse the report into a single result carrying every failure.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.failures.is_empty() {
            Ok(self.provisioned)
        } else {
            Err(InstallerError::ProvisionFailures {
                failures: self.failures,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstallerConfigProvisioner {
    api_endpoint: String,
}

impl InstallerConfigProvisioner {
    pub fn new(api_endpoint: impl Into<String>) -> Self {
        Self {
            api_endpoint: api_endpoint.into(),
        }
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    /// Applies the installers configured per machine to `services`.
    ///
    /// A machine whose installers cannot be resolved is left untouched and
    /// recorded in the report; the other machines are still provisioned.
    pub fn provision(
        &self,
        services: &mut IndexMap<String, ServiceSpec>,
        installers_by_machine: &IndexMap<String, Vec<String>>,
        registry: &dyn InstallerRegistry,
    ) -> ProvisionReport {
        let mut report = ProvisionReport::default();

        for (machine, ids) in installers_by_machine {
            match self.provision_machine(services, machine, ids, registry) {
                Ok(()) => report.provisioned.push(machine.clone()),
                Err(e) => {
                    warn!(machine = %machine, "installer provisioning failed: {e}");
                    report.failures.insert(machine.clone(), e);
                }
            }
        }

        info!(
            provisioned = report.provisioned.len(),
            failed = report.failures.len(),
            "installer provisioning finished"
        );
        report
    }

    fn provision_machine(
        &self,
        services: &mut IndexMap<String, ServiceSpec>,
        machine: &str,
        ids: &[String],
        registry: &dyn InstallerRegistry,
    ) -> Result<()> {
        let service = services
            .get_mut(machine)
            .ok_or_else(|| InstallerError::UnknownMachine(machine.to_string()))?;

        if ids.is_empty() {
            return Ok(());
        }

        let installers =
            registry
                .ordered_installers(ids)
                .map_err(|e| InstallerError::InstallerResolution {
                    machine: machine.to_string(),
                    source: Box::new(e),
                })?;

        for installer in &installers {
            debug!(machine, installer = %installer.id, "applying installer");
            // Later installers override earlier ones on key collision.
            service.environment.extend(
                installer
                    .properties
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
            apply_servers(service, &installer.servers);
        }

        service
            .environment
            .insert(WORKSPACE_API_ENDPOINT.to_string(), self.api_endpoint.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LocalInstallerRegistry;
    use crate::types::InstallerDescriptor;
    use devenv_recipe::ServerConfig;

    fn services(names: &[&str]) -> IndexMap<String, ServiceSpec> {
        names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    ServiceSpec {
                        name: name.to_string(),
                        image: Some("ubuntu".into()),
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    fn request(entries: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(machine, ids)| {
                (
                    machine.to_string(),
                    ids.iter().map(|id| id.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_later_installer_wins() {
        let registry = LocalInstallerRegistry::new([
            InstallerDescriptor::new("A").with_property("X", "1"),
            InstallerDescriptor::new("B")
                .with_property("X", "2")
                .with_property("Y", "3"),
        ]);
        let mut specs = services(&["dev"]);

        let report = InstallerConfigProvisioner::new("localhost:8080").provision(
            &mut specs,
            &request(&[("dev", &["A", "B"])]),
            &registry,
        );

        assert!(report.is_success());
        let env = &specs["dev"].environment;
        assert_eq!(env["X"], "2");
        assert_eq!(env["Y"], "3");
        assert_eq!(env[WORKSPACE_API_ENDPOINT], "localhost:8080");
    }

    #[test]
    fn test_machine_without_installers_gets_no_endpoint() {
        let registry = LocalInstallerRegistry::default();
        let mut specs = services(&["dev", "db"]);

        let report = InstallerConfigProvisioner::new("api:8080").provision(
            &mut specs,
            &request(&[("db", &[])]),
            &registry,
        );

        assert_eq!(report.provisioned, vec!["db"]);
        assert!(specs["db"].environment.is_empty());
        assert!(specs["dev"].environment.is_empty());
    }

    #[test]
    fn test_failures_are_isolated_per_machine() {
        let registry = LocalInstallerRegistry::new([
            InstallerDescriptor::new("ws-agent").with_property("AGENT", "on"),
        ]);
        let mut specs = services(&["dev", "db"]);

        let report = InstallerConfigProvisioner::new("api:8080").provision(
            &mut specs,
            &request(&[
                ("db", &["missing"]),
                ("ghost", &["ws-agent"]),
                ("dev", &["ws-agent"]),
            ]),
            &registry,
        );

        assert_eq!(report.provisioned, vec!["dev"]);
        assert_eq!(specs["dev"].environment["AGENT"], "on");
        assert!(specs["db"].environment.is_empty());
        assert!(matches!(
            report.failures["db"],
            InstallerError::InstallerResolution { .. }
        ));
        assert!(matches!(
            report.failures["ghost"],
            InstallerError::UnknownMachine(_)
        ));

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("2 machine(s)"));
    }

    #[test]
    fn test_installer_servers_are_exposed() {
        let mut exec = InstallerDescriptor::new("exec");
        exec.servers.insert(
            "exec-agent".into(),
            ServerConfig {
                port: "4412".into(),
                protocol: Some("ws".into()),
                path: None,
            },
        );
        let registry = LocalInstallerRegistry::new([exec]);
        let mut specs = services(&["dev"]);

        InstallerConfigProvisioner::new("api:8080")
            .provision(&mut specs, &request(&[("dev", &["exec"])]), &registry)
            .into_result()
            .unwrap();

        let dev = &specs["dev"];
        assert!(dev.exposed_ports.contains("4412/tcp"));
        assert_eq!(dev.labels["dev.workspace.server.4412/tcp.ref"], "exec-agent");
        assert_eq!(dev.labels["dev.workspace.server.4412/tcp.protocol"], "ws");
    }
}
