use devenv_recipe::ServerConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{InstallerError, Result};

/// A unit of machine configuration, stored as one YAML file per installer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerDescriptor {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ids of installers that must be applied before this one.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Environment variables contributed to the machine.
    #[serde(default)]
    pub properties: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(default)]
    pub servers: IndexMap<String, ServerConfig>,
}

impl InstallerDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(InstallerError::InvalidDescriptor(
                "installer id must not be empty".into(),
            ));
        }
        if self.dependencies.iter().any(|dep| dep == &self.id) {
            return Err(InstallerError::InvalidDescriptor(format!(
                "installer '{}' depends on itself",
                self.id
            )));
        }
        if self.properties.keys().any(|key| key.trim().is_empty()) {
            return Err(InstallerError::InvalidDescriptor(format!(
                "installer '{}' declares a property with an empty name",
                self.id
            )));
        }
        Ok(())
    }
}
