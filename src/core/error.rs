//! Errors raised by the state engine.

use thiserror::Error;

/// Structural misuse of a state tree.
///
/// These are raised at the offending call and never recovered from
/// internally. Soft absences (no handler for a message, no matching
/// transition, no implementation for a delegated method) are not errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Missing required argument: {argument}")]
    MissingArgument { argument: &'static str },

    #[error("Identifier must not be empty")]
    InvalidIdentifier,

    #[error("Anonymous function cannot be registered without a name")]
    AnonymousFunction,

    #[error("State '{name}' is not a substate of '{parent}'")]
    StateNotFound { name: String, parent: String },

    #[error("Setting '{state}' as the current state of '{parent}' would create a circular reference")]
    CircularReference { state: String, parent: String },

    #[error("No method named '{name}' on state '{state}'")]
    UnknownMethod { name: String, state: String },
}
