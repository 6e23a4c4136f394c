//! Rewindable record of a node's past active children.
//!
//! Every actual transition appends the child that was active before it,
//! so the most recent entry is the state the node just left.

use super::error::StateError;
use super::node::{NodeInner, StateNode, Target};
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::rc::Weak;
use std::time::Duration;
use tracing::debug;

/// One recorded active child (`None` when nothing was active).
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    /// The active child being left
    pub state: Option<StateNode>,
    /// When the transition away from it happened
    pub recorded_at: DateTime<Utc>,
}

/// History of a single node's active children, oldest first.
///
/// # Example
///
/// ```rust
/// use commonwealth::StateNode;
///
/// let player = StateNode::new("player");
/// player.add_substate("idle").unwrap();
/// player.add_substate("running").unwrap();
/// player.set_current_state("idle").unwrap();
/// player.set_current_state("running").unwrap();
///
/// let history = player.history().unwrap();
/// assert_eq!(history.len(), 2);
///
/// history.rewind(1).unwrap();
/// assert_eq!(player.current_state().unwrap().identifier(), Some("idle"));
/// ```
pub struct History {
    owner: Weak<NodeInner>,
    entries: RefCell<Vec<HistoryEntry>>,
}

impl History {
    pub(crate) fn new(owner: Weak<NodeInner>) -> Self {
        Self {
            owner,
            entries: RefCell::new(Vec::new()),
        }
    }

    /// The node this history belongs to, while it is alive.
    pub fn owner(&self) -> Option<StateNode> {
        self.owner.upgrade().map(StateNode::from_inner)
    }

    /// Append `state` without any validation.
    pub fn add_state(&self, state: Option<StateNode>) {
        self.entries.borrow_mut().push(HistoryEntry {
            state,
            recorded_at: Utc::now(),
        });
    }

    /// The most recently recorded entry. The outer `None` means the
    /// history is empty; the inner one means nothing was active.
    pub fn previous_state(&self) -> Option<Option<StateNode>> {
        self.entries.borrow().last().map(|entry| entry.state.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Forget all entries. The owner's current state is unchanged.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.borrow().clone()
    }

    /// Recorded states, oldest first.
    pub fn path(&self) -> Vec<Option<StateNode>> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.state.clone())
            .collect()
    }

    /// Time between the first and last recorded entries.
    pub fn duration(&self) -> Option<Duration> {
        let entries = self.entries.borrow();
        match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => last
                .recorded_at
                .signed_duration_since(first.recorded_at)
                .to_std()
                .ok(),
            _ => None,
        }
    }

    /// Return the owner to the state that was active `steps` transitions ago.
    ///
    /// `steps` is clamped to `1..=len`. With fewer than two entries this is
    /// a no-op. The transition back is recorded by the owner like any
    /// other and then dropped, so the history ends `steps` entries shorter.
    ///
    /// Entries are only dropped once the owner has actually reached the
    /// target. If the transition fails before that (an `exit` hook error,
    /// a circular target), the error is returned and the history is left
    /// as it was.
    pub fn rewind(&self, steps: usize) -> Result<Option<StateNode>, StateError> {
        let Some(owner) = self.owner() else {
            return Ok(None);
        };

        let len = self.len();
        if len <= 1 {
            return Ok(owner.current_state());
        }
        let steps = steps.clamp(1, len);

        let keep = len - steps;
        let target = self.entries.borrow()[keep].state.clone();

        debug!(node = %owner, steps, "rewinding history");

        let result = owner.set_current_state(Target::from(target.clone()));
        if owner.current_state() == target {
            self.entries.borrow_mut().truncate(keep);
        }
        result?;

        Ok(owner.current_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with(names: &[&str]) -> (StateNode, Vec<StateNode>) {
        let node = StateNode::new("node");
        let children = names
            .iter()
            .map(|name| node.add_substate(*name).unwrap())
            .collect();
        (node, children)
    }

    #[test]
    fn new_history_is_empty() {
        let node = StateNode::new("node");
        let history = node.history().unwrap();
        assert!(history.is_empty());
        assert_eq!(history.previous_state(), None);
        assert!(history.duration().is_none());
        assert_eq!(history.owner(), Some(node.clone()));
    }

    #[test]
    fn transitions_record_the_previous_state() {
        let (node, states) = node_with(&["a", "b"]);
        node.set_current_state(&states[0]).unwrap();
        node.set_current_state(&states[1]).unwrap();

        let history = node.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.previous_state(), Some(Some(states[0].clone())));
        assert_eq!(history.path(), vec![None, Some(states[0].clone())]);
        assert!(history.duration().is_some());
    }

    #[test]
    fn add_state_accepts_none() {
        let node = StateNode::new("node");
        let history = node.history().unwrap();
        history.add_state(None);
        assert_eq!(history.previous_state(), Some(None));
    }

    #[test]
    fn clear_keeps_current_state() {
        let (node, states) = node_with(&["a"]);
        node.set_current_state(&states[0]).unwrap();
        node.history().unwrap().clear();

        assert!(node.history().unwrap().is_empty());
        assert_eq!(node.current_state(), Some(states[0].clone()));
    }

    #[test]
    fn rewind_with_short_history_is_noop() {
        let (node, states) = node_with(&["a"]);
        let history = node.history().unwrap();
        assert_eq!(history.rewind(1).unwrap(), None);

        node.set_current_state(&states[0]).unwrap();
        assert_eq!(history.rewind(1).unwrap(), Some(states[0].clone()));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn rewind_one_step() {
        let (node, states) = node_with(&["a", "b", "c"]);
        for state in &states {
            node.set_current_state(state).unwrap();
        }

        let history = node.history().unwrap();
        let current = history.rewind(1).unwrap();

        assert_eq!(current, Some(states[1].clone()));
        assert_eq!(history.len(), 2);
        assert_eq!(history.path(), vec![None, Some(states[0].clone())]);
    }

    #[test]
    fn rewind_many_steps_and_clamp() {
        let (node, states) = node_with(&["a", "b", "c"]);
        for state in &states {
            node.set_current_state(state).unwrap();
        }

        let history = node.history().unwrap();
        assert_eq!(history.rewind(2).unwrap(), Some(states[0].clone()));
        assert_eq!(history.len(), 1);

        node.set_current_state(&states[2]).unwrap();
        assert_eq!(history.rewind(100).unwrap(), None);
        assert!(history.is_empty());
    }

    #[test]
    fn rewind_to_current_state_does_not_drop_extra_entries() {
        let (node, states) = node_with(&["a", "b"]);
        node.set_current_state(&states[0]).unwrap();
        node.set_current_state(&states[1]).unwrap();
        node.set_current_state(&states[0]).unwrap();

        let history = node.history().unwrap();
        assert_eq!(history.rewind(2).unwrap(), Some(states[0].clone()));
        assert_eq!(history.path(), vec![None]);
    }

    #[test]
    fn failed_rewind_keeps_history() {
        use crate::core::node::lifecycle;

        let (node, states) = node_with(&["a", "b", "c"]);
        for state in &states {
            node.set_current_state(state).unwrap();
        }
        states[2].set_exit(lifecycle(|_| Err(StateError::InvalidIdentifier)));

        let history = node.history().unwrap();
        let before = history.path();

        assert_eq!(history.rewind(1), Err(StateError::InvalidIdentifier));
        assert_eq!(history.len(), 3);
        assert_eq!(history.path(), before);
        assert_eq!(node.current_state(), Some(states[2].clone()));
    }

    #[test]
    fn rewind_fires_lifecycle_hooks() {
        use crate::core::node::lifecycle;
        use std::rc::Rc;

        let entered = Rc::new(RefCell::new(0));
        let (node, states) = node_with(&["a", "b"]);
        let counter = entered.clone();
        states[0].set_enter(lifecycle(move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        }));

        node.set_current_state(&states[0]).unwrap();
        node.set_current_state(&states[1]).unwrap();
        node.rewind(1).unwrap();

        assert_eq!(*entered.borrow(), 2);
    }
}
