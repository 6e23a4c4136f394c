//! Commonwealth: hierarchical state machines for client applications.
//!
//! A [`StateNode`] can contain substates and keeps one of them active.
//! Behaviour is composed rather than inherited: a node can delegate a
//! method to whichever descendant is active, broadcast messages down its
//! active chain, switch states from declarative transition tables and
//! rewind its history of past states.
//!
//! # Core Concepts
//!
//! - **StateNode**: composite state with an active child and enter/exit hooks
//! - **Delegated methods**: calls resolved by the deepest active implementation
//! - **Messages**: handlers and transition tables triggered by name
//! - **History**: rewindable record of past active children
//! - **Loader**: builds trees from serde-deserialized descriptions
//!
//! # Example
//!
//! ```rust
//! use commonwealth::{transition_table, StateNode};
//! use serde_json::{json, Value};
//!
//! let light = StateNode::new("light");
//! let on = light.add_substate("on").unwrap();
//! light.add_substate("off").unwrap();
//! for color in ["red", "green", "yellow"] {
//!     on.add_substate(color).unwrap();
//! }
//! on.set_current_state("red").unwrap();
//!
//! light.add_transition("on", transition_table! { "null" => "on", "off" => "on" });
//! on.add_transition("change", transition_table! {
//!     "red" => "green",
//!     "green" => "yellow",
//!     "yellow" => "red",
//! });
//!
//! light.add_state_method("color", None).unwrap();
//! on.get_state_by_name("green")
//!     .unwrap()
//!     .define_method("color", |_: &StateNode, _: &[Value]| Ok(json!("green")))
//!     .unwrap();
//!
//! light.dispatch("on", &[]).unwrap();
//! light.dispatch("change", &[]).unwrap();
//!
//! assert_eq!(light.final_current_state().identifier(), Some("green"));
//! assert_eq!(light.call("color", &[]).unwrap(), json!("green"));
//! ```

pub mod builder;
pub mod core;

// Re-export commonly used types
pub use self::builder::{ConfigError, StateConfig, StateLoader};
pub use self::core::{
    handler, hook, lifecycle, method, Dispatcher, Handler, History, HistoryEntry, Hook,
    Lifecycle, Method, MethodSpec, NamedFn, NodeOptions, SourceKey, StateError, StateNode,
    Substate, Target, TransitionTable,
};
