//! Launch keys and roots for language server instances.
//!
//! A registry of running language servers asks a [`LaunchStrategy`] which key
//! a newly opened file maps to, reuses the instance registered under that key,
//! and otherwise starts one rooted at [`LaunchStrategy::root_uri`].

pub mod error;
mod paths;
pub mod strategy;

pub use error::{Result, RootResolutionError};
pub use strategy::{
    strategy_for, LaunchPolicy, LaunchStrategy, PerProjectStrategy, PerWorkspaceStrategy,
};
