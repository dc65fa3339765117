//! Error types for recipe handling.
//!
//! Every failure is a deterministic function of the input except
//! [`RecipeError::RecipeUnavailable`], which wraps a fetch collaborator error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecipeError>;

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("Invalid image reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Content type '{content_type}' is not supported. Supported values are: {}", supported.join(", "))]
    UnsupportedContentType {
        content_type: String,
        supported: Vec<String>,
    },

    #[error("Parsing of environment configuration failed. {0}")]
    MalformedRecipe(String),

    #[error("Recipe from location '{location}' is not available: {source}")]
    RecipeUnavailable {
        location: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Service '{service}' references unknown service '{target}'")]
    DanglingDependency { service: String, target: String },

    #[error("Invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("Start order of services is not resolvable, cyclic dependencies among: {}", services.join(", "))]
    UnresolvableStartOrder { services: Vec<String> },
}

impl RecipeError {
    pub(crate) fn invalid_reference(reference: &str, reason: impl Into<String>) -> Self {
        RecipeError::InvalidReference {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}
