//! Serializable description of a state tree.

use crate::core::{SourceKey, Target, TransitionTable};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Declarative description of one state and, recursively, its substates.
///
/// Functions cannot be serialized, so `enter`, `exit` and method defaults
/// name functions registered with the
/// [`StateLoader`](crate::builder::StateLoader).
///
/// # Example
///
/// ```rust
/// use commonwealth::builder::StateConfig;
///
/// let config: StateConfig = serde_json::from_str(r#"{
///     "name": "light",
///     "defaultState": "off",
///     "states": [{ "name": "on" }, { "name": "off" }],
///     "transitions": { "toggle": { "on": "off", "off": "on" } }
/// }"#).unwrap();
///
/// assert_eq!(config.states.len(), 2);
/// assert!(config.use_history);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateConfig {
    /// Identifier of the state. Optional only for the root.
    #[serde(default)]
    pub name: Option<String>,

    /// Nested substates, built recursively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<StateConfig>,

    /// Substate entered after loading and on reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_state: Option<String>,

    /// Return to `default_state` whenever this state is entered.
    #[serde(default)]
    pub reset_on_enter: bool,

    /// Record past active children. Defaults to `true`.
    #[serde(default = "default_use_history")]
    pub use_history: bool,

    /// Delegated methods registered on this state.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodConfig>,

    /// Transition tables keyed by message name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transitions: BTreeMap<String, TransitionConfig>,

    /// Registered lifecycle hook run on entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enter: Option<String>,

    /// Registered lifecycle hook run on exit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<String>,
}

fn default_use_history() -> bool {
    true
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            name: None,
            states: Vec::new(),
            default_state: None,
            reset_on_enter: false,
            use_history: true,
            methods: Vec::new(),
            transitions: BTreeMap::new(),
            enter: None,
            exit: None,
        }
    }
}

impl StateConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn state(mut self, child: StateConfig) -> Self {
        self.states.push(child);
        self
    }

    pub fn default_state(mut self, name: impl Into<String>) -> Self {
        self.default_state = Some(name.into());
        self
    }

    pub fn reset_on_enter(mut self, reset: bool) -> Self {
        self.reset_on_enter = reset;
        self
    }

    pub fn method(mut self, method: MethodConfig) -> Self {
        self.methods.push(method);
        self
    }

    pub fn transition(mut self, message: impl Into<String>, table: TransitionConfig) -> Self {
        self.transitions.insert(message.into(), table);
        self
    }
}

/// A delegated method: a bare name, or a name plus a registered default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodConfig {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl MethodConfig {
    pub fn name(&self) -> &str {
        match self {
            MethodConfig::Name(name) => name,
            MethodConfig::Detailed { name, .. } => name,
        }
    }

    pub fn default_fn(&self) -> Option<&str> {
        match self {
            MethodConfig::Name(_) => None,
            MethodConfig::Detailed { default, .. } => default.as_deref(),
        }
    }
}

/// Source → target rules in the order they were written.
///
/// Serialized as a map whose keys are source keys (`"*"`, `"null"` or a
/// substate name) and whose values are a substate name or `null`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransitionConfig {
    rules: Vec<(String, Option<String>)>,
}

impl TransitionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, source: impl Into<String>, target: Option<&str>) -> Self {
        self.rules.push((source.into(), target.map(str::to_string)));
        self
    }

    pub fn rules(&self) -> &[(String, Option<String>)] {
        &self.rules
    }

    pub fn to_table(&self) -> TransitionTable {
        self.rules
            .iter()
            .map(|(source, target)| (SourceKey::from(source.as_str()), Target::from(target.clone())))
            .collect()
    }
}

impl Serialize for TransitionConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for (source, target) in &self.rules {
            map.serialize_entry(source, target)?;
        }
        map.end()
    }
}

struct TransitionConfigVisitor;

impl<'de> Visitor<'de> for TransitionConfigVisitor {
    type Value = TransitionConfig;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of source state to target state or null")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut rules = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((source, target)) = access.next_entry::<String, Option<String>>()? {
            rules.push((source, target));
        }
        Ok(TransitionConfig { rules })
    }
}

impl<'de> Deserialize<'de> for TransitionConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TransitionConfigVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_rules_keep_document_order() {
        let table: TransitionConfig =
            serde_json::from_str(r#"{ "yellow": "red", "red": "green", "*": null }"#).unwrap();

        assert_eq!(
            table.rules(),
            &[
                ("yellow".to_string(), Some("red".to_string())),
                ("red".to_string(), Some("green".to_string())),
                ("*".to_string(), None),
            ]
        );
        assert_eq!(table.to_table().rules()[2], (SourceKey::Any, Target::None));
    }

    #[test]
    fn methods_accept_names_and_objects() {
        let methods: Vec<MethodConfig> =
            serde_json::from_str(r#"["speak", { "name": "calculate", "default": "zero" }]"#)
                .unwrap();

        assert_eq!(methods[0].name(), "speak");
        assert_eq!(methods[0].default_fn(), None);
        assert_eq!(methods[1].name(), "calculate");
        assert_eq!(methods[1].default_fn(), Some("zero"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: StateConfig = serde_json::from_str(r#"{ "name": "solo" }"#).unwrap();
        assert_eq!(config, StateConfig::named("solo"));
        assert!(config.use_history);
        assert!(!config.reset_on_enter);
    }

    #[test]
    fn config_serializes_back() {
        let config = StateConfig::named("light")
            .state(StateConfig::named("on"))
            .default_state("on")
            .transition("off", TransitionConfig::new().rule("*", None));

        let json = serde_json::to_string(&config).unwrap();
        let parsed: StateConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, config);
    }
}
