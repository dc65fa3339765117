pub mod discovery;
pub mod error;
pub mod provisioner;
pub mod registry;
pub mod types;

pub use discovery::{discover_installers, registry_from_dir};
pub use error::{InstallerError, Result};
pub use provisioner::{InstallerConfigProvisioner, ProvisionReport, WORKSPACE_API_ENDPOINT};
pub use registry::{InstallerRegistry, LocalInstallerRegistry};
pub use types::InstallerDescriptor;
