//! Errors raised while loading a declarative state description.

use crate::builder::validation::ConfigViolation;
use crate::core::StateError;
use thiserror::Error;

/// Errors that can occur when building a state tree from a description.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse state description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid state description ({} violation(s))", .0.len())]
    Invalid(Vec<ConfigViolation>),

    #[error("Function '{0}' is not registered with the loader")]
    UnknownFunction(String),

    #[error(transparent)]
    State(#[from] StateError),
}
