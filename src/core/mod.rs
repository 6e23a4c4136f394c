//! The hierarchical state engine.
//!
//! - [`StateNode`]: composite states, guarded transitions, lifecycle hooks
//! - [`Dispatcher`]: methods delegated down the active chain
//! - [`TransitionTable`]: message-driven declarative transitions
//! - [`History`]: rewindable record of past active children
//!
//! The engine is single-threaded and synchronous. Hooks and handlers run
//! to completion inside the call that triggered them and may themselves
//! start further transitions.

mod delegation;
mod error;
mod history;
mod messages;
mod node;

pub use delegation::{hook, method, Dispatcher, Hook, Method, MethodSpec, NamedFn};
pub use error::StateError;
pub use history::{History, HistoryEntry};
pub use messages::{handler, Handler, SourceKey, TransitionTable};
pub use node::{lifecycle, Lifecycle, NodeOptions, StateNode, Substate, Target};
