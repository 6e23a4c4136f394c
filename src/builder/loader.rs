//! Build state trees from declarative descriptions.

use crate::builder::config::StateConfig;
use crate::builder::error::ConfigError;
use crate::builder::validation::validate;
use crate::core::{Lifecycle, Method, NodeOptions, StateError, StateNode};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;
use stillwater::validation::Validation;
use tracing::debug;

/// Builds [`StateNode`] trees from [`StateConfig`] descriptions.
///
/// Descriptions refer to functions by name; register them here first.
///
/// # Example
///
/// ```rust
/// use commonwealth::builder::StateLoader;
/// use serde_json::json;
///
/// let loader = StateLoader::new()
///     .register_method("silence", |_, _| Ok(json!("...")));
///
/// let dog = loader.load_json(r#"{
///     "name": "dog",
///     "defaultState": "sleeping",
///     "methods": [{ "name": "speak", "default": "silence" }],
///     "states": [{ "name": "sleeping" }, { "name": "awake" }]
/// }"#).unwrap();
///
/// assert_eq!(dog.current_state().unwrap().identifier(), Some("sleeping"));
/// assert_eq!(dog.call("speak", &[]).unwrap(), json!("..."));
/// ```
#[derive(Clone, Default)]
pub struct StateLoader {
    methods: HashMap<String, Method>,
    lifecycles: HashMap<String, Lifecycle>,
}

impl StateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function usable as a method default.
    pub fn register_method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&StateNode, &[Value]) -> Result<Value, StateError> + 'static,
    {
        self.methods.insert(name.into(), Rc::new(f));
        self
    }

    /// Register a function usable as an `enter` or `exit` hook.
    pub fn register_lifecycle<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&StateNode) -> Result<(), StateError> + 'static,
    {
        self.lifecycles.insert(name.into(), Rc::new(f));
        self
    }

    pub(crate) fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub(crate) fn has_lifecycle(&self, name: &str) -> bool {
        self.lifecycles.contains_key(name)
    }

    pub fn load_json(&self, json: &str) -> Result<StateNode, ConfigError> {
        let config: StateConfig = serde_json::from_str(json)?;
        self.load(&config)
    }

    /// Validate `config`, build the whole tree, then activate every
    /// declared default state, deepest first.
    pub fn load(&self, config: &StateConfig) -> Result<StateNode, ConfigError> {
        if let Validation::Failure(violations) = validate(config, self) {
            return Err(ConfigError::Invalid(violations.iter().cloned().collect()));
        }

        let root = self.build(config)?;
        apply_default_states(&root, config)?;

        debug!(root = %root, id = %root.id(), "loaded state tree");
        Ok(root)
    }

    fn build(&self, config: &StateConfig) -> Result<StateNode, ConfigError> {
        let name = config
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or(StateError::InvalidIdentifier)?;
        let options = NodeOptions {
            use_history: config.use_history,
            ..NodeOptions::default()
        };
        let node = StateNode::with_options(Some(name), options);

        for child in &config.states {
            node.add_substate(self.build(child)?)?;
        }

        node.set_reset_on_enter(config.reset_on_enter);
        node.set_default_state(config.default_state.clone());

        for method in &config.methods {
            let default = method
                .default_fn()
                .map(|name| self.method(name))
                .transpose()?;
            node.add_state_method(method.name(), default)?;
        }

        for (message, table) in &config.transitions {
            node.add_transition(message.clone(), table.to_table());
        }

        if let Some(enter) = &config.enter {
            node.set_enter(self.lifecycle(enter)?);
        }
        if let Some(exit) = &config.exit {
            node.set_exit(self.lifecycle(exit)?);
        }

        Ok(node)
    }

    fn method(&self, name: &str) -> Result<Method, ConfigError> {
        self.methods
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFunction(name.to_string()))
    }

    fn lifecycle(&self, name: &str) -> Result<Lifecycle, ConfigError> {
        self.lifecycles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFunction(name.to_string()))
    }
}

fn apply_default_states(node: &StateNode, config: &StateConfig) -> Result<(), StateError> {
    for child_config in &config.states {
        let child = child_config
            .name
            .as_deref()
            .and_then(|name| node.get_state_by_name(name));
        if let Some(child) = child {
            apply_default_states(&child, child_config)?;
        }
    }
    if let Some(default) = &config.default_state {
        node.set_current_state(default.as_str())?;
    }
    Ok(())
}
