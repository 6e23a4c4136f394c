//! Composite state nodes and the transition engine.
//!
//! A [`StateNode`] is a cheap, clonable handle to a node in a tree of
//! states. Each node owns its substates, points at one of them (or any
//! other node) as its active child, and keeps a weak back-reference to
//! whichever node activated it.

use super::delegation::Dispatcher;
use super::delegation::Method;
use super::error::StateError;
use super::history::History;
use super::messages::Handler;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle hook fired when a node is entered or exited.
pub type Lifecycle = Rc<dyn Fn(&StateNode) -> Result<(), StateError>>;

/// Wrap a closure as a [`Lifecycle`] hook.
pub fn lifecycle<F>(f: F) -> Lifecycle
where
    F: Fn(&StateNode) -> Result<(), StateError> + 'static,
{
    Rc::new(f)
}

/// Construction options for a [`StateNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOptions {
    /// Record past active children in a [`History`].
    pub use_history: bool,
    /// Generate `state0`, `state1`, ... when a substate is added without a name.
    pub auto_name: bool,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            use_history: true,
            auto_name: true,
        }
    }
}

impl NodeOptions {
    pub fn without_history(mut self) -> Self {
        self.use_history = false;
        self
    }

    pub fn without_auto_name(mut self) -> Self {
        self.auto_name = false;
        self
    }
}

/// What a transition should make active.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Target {
    /// Deactivate: no active child.
    #[default]
    None,
    /// A substate looked up by identifier.
    Name(String),
    /// A node given directly.
    Node(StateNode),
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Name(name)
    }
}

impl From<StateNode> for Target {
    fn from(node: StateNode) -> Self {
        Target::Node(node)
    }
}

impl From<&StateNode> for Target {
    fn from(node: &StateNode) -> Self {
        Target::Node(node.clone())
    }
}

impl From<Option<StateNode>> for Target {
    fn from(node: Option<StateNode>) -> Self {
        node.map_or(Target::None, Target::Node)
    }
}

impl From<Option<String>> for Target {
    fn from(name: Option<String>) -> Self {
        name.map_or(Target::None, Target::Name)
    }
}

/// What to register with [`StateNode::add_substate`].
#[derive(Clone, Debug, Default)]
pub enum Substate {
    /// Create a child with a generated name.
    #[default]
    Auto,
    /// Create (or fetch) a child with this name.
    Name(String),
    /// Register an existing node under its own identifier.
    Node(StateNode),
}

impl From<&str> for Substate {
    fn from(name: &str) -> Self {
        Substate::Name(name.to_string())
    }
}

impl From<String> for Substate {
    fn from(name: String) -> Self {
        Substate::Name(name)
    }
}

impl From<StateNode> for Substate {
    fn from(node: StateNode) -> Self {
        Substate::Node(node)
    }
}

impl From<&StateNode> for Substate {
    fn from(node: &StateNode) -> Self {
        Substate::Node(node.clone())
    }
}

pub(crate) struct NodeInner {
    pub(super) id: Uuid,
    pub(super) identifier: Option<String>,
    pub(super) options: NodeOptions,
    pub(super) substates: RefCell<HashMap<String, StateNode>>,
    pub(super) active: RefCell<Option<StateNode>>,
    pub(super) parent: RefCell<Weak<NodeInner>>,
    pub(super) default_state: RefCell<Option<String>>,
    pub(super) reset_on_enter: Cell<bool>,
    pub(super) next_auto_id: Cell<usize>,
    pub(super) own_methods: RefCell<HashMap<String, Method>>,
    pub(super) dispatchers: RefCell<HashMap<String, Dispatcher>>,
    pub(super) handlers: RefCell<HashMap<String, Vec<Handler>>>,
    pub(super) enter: RefCell<Option<Lifecycle>>,
    pub(super) exit: RefCell<Option<Lifecycle>>,
    pub(super) history: Option<History>,
}

/// A state that may contain substates and delegate to its active one.
///
/// Cloning a `StateNode` clones the handle, not the node; equality is
/// identity.
///
/// # Example
///
/// ```rust
/// use commonwealth::StateNode;
///
/// let light = StateNode::new("light");
/// let on = light.add_substate("on").unwrap();
/// light.add_substate("off").unwrap();
///
/// assert!(light.current_state().is_none());
/// light.set_current_state("on").unwrap();
/// assert_eq!(light.current_state(), Some(on));
/// ```
#[derive(Clone)]
pub struct StateNode {
    pub(super) inner: Rc<NodeInner>,
}

impl PartialEq for StateNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for StateNode {}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("identifier", &self.inner.identifier)
            .field("id", &self.inner.id)
            .field(
                "active",
                &self.current_state().map(|s| s.display_name().to_string()),
            )
            .finish()
    }
}

impl fmt::Display for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl StateNode {
    /// Create a named node with default options.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self::with_options(Some(identifier.into()), NodeOptions::default())
    }

    /// Create a node without an identifier. It cannot be registered as a
    /// substate but can serve as a root.
    pub fn anonymous() -> Self {
        Self::with_options(None, NodeOptions::default())
    }

    /// Create a node with explicit [`NodeOptions`]. `None` makes it anonymous.
    pub fn with_options(identifier: Option<String>, options: NodeOptions) -> Self {
        let inner = Rc::new_cyclic(|owner: &Weak<NodeInner>| NodeInner {
            id: Uuid::new_v4(),
            identifier,
            options,
            substates: RefCell::new(HashMap::new()),
            active: RefCell::new(None),
            parent: RefCell::new(Weak::new()),
            default_state: RefCell::new(None),
            reset_on_enter: Cell::new(false),
            next_auto_id: Cell::new(0),
            own_methods: RefCell::new(HashMap::new()),
            dispatchers: RefCell::new(HashMap::new()),
            handlers: RefCell::new(HashMap::new()),
            enter: RefCell::new(None),
            exit: RefCell::new(None),
            history: options.use_history.then(|| History::new(owner.clone())),
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Rc<NodeInner>) -> Self {
        Self { inner }
    }

    /// Unique id generated at construction, used in log fields.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The name this node is registered under in its parent.
    pub fn identifier(&self) -> Option<&str> {
        self.inner.identifier.as_deref()
    }

    pub(crate) fn display_name(&self) -> &str {
        self.identifier().unwrap_or("<anonymous>")
    }

    /// The options the node was built with.
    pub fn options(&self) -> NodeOptions {
        self.inner.options
    }

    /// The history of this node's active children, unless disabled.
    pub fn history(&self) -> Option<&History> {
        self.inner.history.as_ref()
    }

    pub fn default_state(&self) -> Option<String> {
        self.inner.default_state.borrow().clone()
    }

    pub fn set_default_state(&self, identifier: Option<String>) {
        self.inner.default_state.replace(identifier);
    }

    pub fn reset_on_enter(&self) -> bool {
        self.inner.reset_on_enter.get()
    }

    pub fn set_reset_on_enter(&self, reset: bool) {
        self.inner.reset_on_enter.set(reset);
    }

    pub fn set_enter(&self, hook: Lifecycle) {
        self.inner.enter.replace(Some(hook));
    }

    pub fn set_exit(&self, hook: Lifecycle) {
        self.inner.exit.replace(Some(hook));
    }

    /// The active child, or `None`.
    pub fn current_state(&self) -> Option<StateNode> {
        self.inner.active.borrow().clone()
    }

    /// Alias of [`current_state`](Self::current_state).
    pub fn get_current_state(&self) -> Option<StateNode> {
        self.current_state()
    }

    /// The node that activated this one, if it is still alive and set.
    pub fn parent_state(&self) -> Option<StateNode> {
        self.inner.parent.borrow().upgrade().map(StateNode::from_inner)
    }

    /// True while some node holds this one as its active child.
    pub fn is_active(&self) -> bool {
        self.parent_state().is_some()
    }

    /// Follow parent links to the topmost active ancestor (or `self`).
    pub fn root_state(&self) -> StateNode {
        let mut node = self.clone();
        while let Some(parent) = node.parent_state() {
            node = parent;
        }
        node
    }

    /// Follow active-child links to the deepest active node (or `self`).
    pub fn final_current_state(&self) -> StateNode {
        let mut node = self.clone();
        while let Some(child) = node.current_state() {
            node = child;
        }
        node
    }

    /// The active chain from [`root_state`](Self::root_state) down to
    /// [`final_current_state`](Self::final_current_state).
    pub fn state_chain_to_array(&self) -> Vec<StateNode> {
        let mut chain = Vec::new();
        let mut next = Some(self.root_state());
        while let Some(node) = next {
            next = node.current_state();
            chain.push(node);
        }
        chain
    }

    /// Direct lookup among this node's substates.
    pub fn get_state_by_name(&self, name: &str) -> Option<StateNode> {
        self.inner.substates.borrow().get(name).cloned()
    }

    pub fn substate_names(&self) -> Vec<String> {
        self.inner.substates.borrow().keys().cloned().collect()
    }

    /// Register a substate.
    ///
    /// [`Substate::Auto`] generates the first free name of the form
    /// `state{n}`. A name that is already registered returns the existing
    /// child; a node replaces whatever was registered under its identifier.
    pub fn add_substate(&self, substate: impl Into<Substate>) -> Result<StateNode, StateError> {
        let node = match substate.into() {
            Substate::Auto => {
                if !self.inner.options.auto_name {
                    return Err(StateError::MissingArgument { argument: "state" });
                }
                StateNode::new(self.next_auto_name())
            }
            Substate::Name(name) => {
                if name.is_empty() {
                    return Err(StateError::InvalidIdentifier);
                }
                if let Some(existing) = self.get_state_by_name(&name) {
                    return Ok(existing);
                }
                StateNode::new(name)
            }
            Substate::Node(node) => {
                match node.identifier() {
                    None => return Err(StateError::MissingArgument { argument: "identifier" }),
                    Some("") => return Err(StateError::InvalidIdentifier),
                    Some(_) => {}
                }
                node
            }
        };

        let key = node.display_name().to_string();
        self.inner.substates.borrow_mut().insert(key, node.clone());
        Ok(node)
    }

    /// [`add_substate`](Self::add_substate) followed by
    /// [`set_current_state`](Self::set_current_state).
    pub fn add_current_state(
        &self,
        substate: impl Into<Substate>,
    ) -> Result<Option<StateNode>, StateError> {
        let node = self.add_substate(substate)?;
        self.set_current_state(node)
    }

    fn next_auto_name(&self) -> String {
        let substates = self.inner.substates.borrow();
        loop {
            let n = self.inner.next_auto_id.get();
            self.inner.next_auto_id.set(n + 1);
            let name = format!("state{n}");
            if !substates.contains_key(&name) {
                return name;
            }
        }
    }

    fn resolve(&self, target: Target) -> Result<Option<StateNode>, StateError> {
        match target {
            Target::None => Ok(None),
            Target::Node(node) => Ok(Some(node)),
            Target::Name(name) => match self.get_state_by_name(&name) {
                Some(node) => Ok(Some(node)),
                None => Err(StateError::StateNotFound {
                    name,
                    parent: self.display_name().to_string(),
                }),
            },
        }
    }

    /// Make `target` the active child, firing `exit` on the old child and
    /// `enter` on the new one.
    ///
    /// Setting the current child again is a no-op. A target that already
    /// sits in this node's active chain (including this node), or whose
    /// own active chain leads back here, is rejected with
    /// [`StateError::CircularReference`]; by then the old child's `exit`
    /// hook has run, but the active pointer and history are left
    /// untouched.
    ///
    /// A target that is still the active child of another parent is first
    /// deactivated there (firing its `exit` hook), so no node is ever
    /// active under two parents.
    ///
    /// Returns this node's active child after all hooks have run.
    pub fn set_current_state(
        &self,
        target: impl Into<Target>,
    ) -> Result<Option<StateNode>, StateError> {
        let new_state = self.resolve(target.into())?;
        let old_state = self.current_state();

        if new_state == old_state {
            return Ok(old_state);
        }

        if let Some(old) = &old_state {
            old.run_exit()?;
            old.inner.parent.replace(Weak::new());
        }

        if let Some(new) = &new_state {
            let admitted = self
                .check_acyclic(new)
                .and_then(|()| self.release_from_previous_parent(new));
            if let Err(err) = admitted {
                if let Some(old) = &old_state {
                    old.inner.parent.replace(Rc::downgrade(&self.inner));
                }
                return Err(err);
            }
        }

        self.inner.active.replace(new_state.clone());
        if let Some(history) = &self.inner.history {
            history.add_state(old_state.clone());
        }

        debug!(
            node = %self,
            node.id = %self.inner.id,
            from = ?old_state.as_ref().map(|s| s.display_name().to_string()),
            to = ?new_state.as_ref().map(|s| s.display_name().to_string()),
            "state transition"
        );

        if let Some(new) = &new_state {
            new.inner.parent.replace(Rc::downgrade(&self.inner));

            if new.reset_on_enter() {
                new.set_current_state(new.default_state())?;
            }
            new.run_enter()?;
        }

        Ok(self.current_state())
    }

    /// Reject `node` if it already sits in this node's active chain, or if
    /// following `node`'s own active children leads back here.
    fn check_acyclic(&self, node: &StateNode) -> Result<(), StateError> {
        if self.state_chain_to_array().contains(node) || node.leads_to(self) {
            warn!(
                state = %node,
                parent = %self,
                "rejected circular state transition"
            );
            return Err(StateError::CircularReference {
                state: node.display_name().to_string(),
                parent: self.display_name().to_string(),
            });
        }
        Ok(())
    }

    fn leads_to(&self, target: &StateNode) -> bool {
        let mut next = Some(self.clone());
        while let Some(node) = next {
            if node == *target {
                return true;
            }
            next = node.current_state();
        }
        false
    }

    /// A node is the active child of at most one parent. If another live
    /// parent still holds `node`, deactivate it there first.
    fn release_from_previous_parent(&self, node: &StateNode) -> Result<(), StateError> {
        match node.parent_state() {
            Some(previous)
                if previous != *self && previous.current_state().as_ref() == Some(node) =>
            {
                warn!(
                    state = %node,
                    previous_parent = %previous,
                    parent = %self,
                    "moving active state to a new parent"
                );
                previous.set_current_state(Target::None).map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// Rewind this node's history; see [`History::rewind`].
    ///
    /// A node without history stays where it is.
    pub fn rewind(&self, steps: usize) -> Result<Option<StateNode>, StateError> {
        match &self.inner.history {
            Some(history) => history.rewind(steps),
            None => Ok(self.current_state()),
        }
    }

    fn run_enter(&self) -> Result<(), StateError> {
        let hook = self.inner.enter.borrow().clone();
        match hook {
            Some(hook) => hook(self),
            None => Ok(()),
        }
    }

    fn run_exit(&self) -> Result<(), StateError> {
        let hook = self.inner.exit.borrow().clone();
        match hook {
            Some(hook) => hook(self),
            None => Ok(()),
        }
    }
}
