//! Message handlers and declarative transition tables.

use super::error::StateError;
use super::node::{StateNode, Target};
use serde_json::Value;
use std::rc::Rc;
use tracing::debug;

/// Handler for a named message. Receives the node it was registered on,
/// the message name and any extra arguments.
pub type Handler = Rc<dyn Fn(&StateNode, &str, &[Value]) -> Result<(), StateError>>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&StateNode, &str, &[Value]) -> Result<(), StateError> + 'static,
{
    Rc::new(f)
}

/// Left-hand side of a transition rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKey {
    /// `"*"`: matches whatever is active.
    Any,
    /// `"null"`: matches only when nothing is active.
    Null,
    /// A substate identifier.
    Name(String),
}

impl From<&str> for SourceKey {
    fn from(key: &str) -> Self {
        match key {
            "*" => SourceKey::Any,
            "null" => SourceKey::Null,
            name => SourceKey::Name(name.to_string()),
        }
    }
}

impl From<String> for SourceKey {
    fn from(key: String) -> Self {
        SourceKey::from(key.as_str())
    }
}

impl SourceKey {
    fn matches(&self, node: &StateNode, current: Option<&StateNode>) -> bool {
        match self {
            SourceKey::Any => true,
            SourceKey::Null => current.is_none(),
            SourceKey::Name(name) => match (node.get_state_by_name(name), current) {
                (Some(source), Some(current)) => source == *current,
                _ => false,
            },
        }
    }
}

/// Ordered source → target rules fired by a single message.
///
/// Rules are scanned in insertion order and the first match wins.
///
/// # Example
///
/// ```rust
/// use commonwealth::{SourceKey, Target, TransitionTable};
///
/// let table = TransitionTable::new()
///     .rule("red", "green")
///     .rule("green", "yellow")
///     .rule("*", Target::None);
///
/// assert_eq!(table.len(), 3);
/// assert_eq!(table.rules()[2].0, SourceKey::Any);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransitionTable {
    rules: Vec<(SourceKey, Target)>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, source: impl Into<SourceKey>, target: impl Into<Target>) -> Self {
        self.push(source, target);
        self
    }

    pub fn push(&mut self, source: impl Into<SourceKey>, target: impl Into<Target>) {
        self.rules.push((source.into(), target.into()));
    }

    pub fn rules(&self) -> &[(SourceKey, Target)] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The target of the first rule matching `node`'s active child.
    pub fn select(&self, node: &StateNode) -> Option<&Target> {
        let current = node.current_state();
        self.rules
            .iter()
            .find(|(source, _)| source.matches(node, current.as_ref()))
            .map(|(_, target)| target)
    }
}

impl<K, T> FromIterator<(K, T)> for TransitionTable
where
    K: Into<SourceKey>,
    T: Into<Target>,
{
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut table = TransitionTable::new();
        for (source, target) in iter {
            table.push(source, target);
        }
        table
    }
}

impl StateNode {
    /// Append `handler` to the handlers for `message`.
    pub fn on(&self, message: impl Into<String>, handler: Handler) {
        self.inner
            .handlers
            .borrow_mut()
            .entry(message.into())
            .or_default()
            .push(handler);
    }

    pub fn handler_count(&self, message: &str) -> usize {
        self.inner
            .handlers
            .borrow()
            .get(message)
            .map_or(0, Vec::len)
    }

    /// Run this node's handlers for `message`, then pass it down to the
    /// active child. Inactive substates never see it.
    ///
    /// The active child is read after this node's handlers ran, so a
    /// message that causes a transition also reaches the newly entered
    /// state.
    pub fn dispatch(&self, message: &str, args: &[Value]) -> Result<(), StateError> {
        let handlers = self
            .inner
            .handlers
            .borrow()
            .get(message)
            .cloned()
            .unwrap_or_default();

        if !handlers.is_empty() {
            debug!(node = %self, name = message, handlers = handlers.len(), "dispatching message");
        }
        for handler in handlers {
            handler(self, message, args)?;
        }

        match self.current_state() {
            Some(child) => child.dispatch(message, args),
            None => Ok(()),
        }
    }

    /// Dispatch `message` from the root of this node's active chain.
    pub fn trigger(&self, message: &str, args: &[Value]) -> Result<(), StateError> {
        self.root_state().dispatch(message, args)
    }

    /// Register a transition table for `message`.
    ///
    /// Each call adds another handler; several tables for the same message
    /// all run, in registration order. The returned handler can also be
    /// invoked directly on this node to force the same transition.
    pub fn add_transition(&self, message: impl Into<String>, table: TransitionTable) -> Handler {
        let transition = handler(move |node, _message, _args| {
            if let Some(target) = table.select(node) {
                node.set_current_state(target.clone())?;
            }
            Ok(())
        });
        self.on(message, transition.clone());
        transition
    }
}
