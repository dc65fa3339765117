use indexmap::IndexMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InstallerError>;

#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("Installer '{0}' is not registered")]
    UnknownInstaller(String),

    #[error("Installers have cyclic dependencies: {}", ids.join(", "))]
    DependencyCycle { ids: Vec<String> },

    #[error("Machine '{0}' is not present in the environment")]
    UnknownMachine(String),

    #[error("Invalid installer descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Installers of machine '{machine}' could not be resolved: {source}")]
    InstallerResolution {
        machine: String,
        #[source]
        source: Box<InstallerError>,
    },

    #[error("Provisioning failed for {} machine(s): {}", failures.len(), summarize(failures))]
    ProvisionFailures { failures: IndexMap<String, InstallerError> },
}

fn summarize(failures: &IndexMap<String, InstallerError>) -> String {
    failures
        .iter()
        .map(|(machine, error)| format!("{machine}: {error}"))
        .collect::<Vec<_>>()
        .join("; ")
}
