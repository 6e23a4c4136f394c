//! Declarative construction of state trees.
//!
//! A [`StateConfig`] describes a tree of states the way a host would write
//! it in JSON; a [`StateLoader`] validates the description, builds the
//! nodes and establishes each node's default state.

pub mod config;
pub mod error;
pub mod loader;
pub mod macros;
pub mod validation;

pub use config::{MethodConfig, StateConfig, TransitionConfig};
pub use error::ConfigError;
pub use loader::StateLoader;
pub use validation::{validate, ConfigViolation};
