//! Recipe handling for workspace environments.
//!
//! Turns compose-style recipe text into an [`EnvironmentGraph`], parses the
//! image references it carries, and applies machine configuration, validation
//! and start ordering on top of it.
//!
//! ## Main Features
//! - Image reference parsing
//! - Recipe decoding and encoding for the YAML content types
//! - Graph building from inline content or fetched locations
//! - Machine server and attribute application
//! - Validation and dependency-first start ordering

pub mod compose;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod image;
pub mod machine;
pub mod order;
pub mod validate;

pub use compose::{decode, encode, ComposeDocument, SUPPORTED_CONTENT_TYPES};
pub use environment::{
    BuildContext, EnvironmentGraph, EnvironmentGraphBuilder, Recipe, ServiceSpec,
};
pub use error::{RecipeError, Result};
pub use fetch::{FileRecipeFetcher, HttpRecipeFetcher, RecipeFetcher, UrlRecipeFetcher};
pub use image::ImageReference;
pub use machine::{apply_machine_configs, apply_servers, MachineConfig, ServerConfig};
pub use order::start_order;
pub use validate::{validate, DependencyPolicy};
