//! Whole-description validation.
//!
//! Every problem in a description is reported at once rather than
//! stopping at the first, using Stillwater's `Validation`.

use crate::builder::config::StateConfig;
use crate::builder::loader::StateLoader;
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// One problem found in a state description. `path` is the dotted chain
/// of state names from the root.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigViolation {
    #[error("{path}: state name is missing or empty")]
    InvalidIdentifier { path: String },

    #[error("{path}: substate '{name}' is declared more than once")]
    DuplicateState { path: String, name: String },

    #[error("{path}: default state '{name}' is not a substate")]
    UnknownDefaultState { path: String, name: String },

    #[error("{path}: transition '{message}' refers to unknown state '{name}'")]
    UnknownTransitionState {
        path: String,
        message: String,
        name: String,
    },

    #[error("{path}: method name is empty")]
    EmptyMethodName { path: String },

    #[error("{path}: function '{name}' is not registered")]
    UnknownFunction { path: String, name: String },
}

pub type ConfigValidation = Validation<(), NonEmptyVec<ConfigViolation>>;

/// Check `config` and all of its substates against `loader`'s registry.
pub fn validate(config: &StateConfig, loader: &StateLoader) -> ConfigValidation {
    let mut checks = Vec::new();
    let path = segment(config, 0);
    check_state(config, &path, loader, &mut checks);
    Validation::all_vec(checks).map(|_| ())
}

fn segment(config: &StateConfig, index: usize) -> String {
    match config.name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("states[{index}]"),
    }
}

fn check(ok: bool, violation: impl FnOnce() -> ConfigViolation) -> ConfigValidation {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

fn check_state(
    config: &StateConfig,
    path: &str,
    loader: &StateLoader,
    checks: &mut Vec<ConfigValidation>,
) {
    let has_name = config.name.as_deref().is_some_and(|name| !name.is_empty());
    checks.push(check(has_name, || ConfigViolation::InvalidIdentifier {
        path: path.to_string(),
    }));

    let mut children = HashSet::new();
    for child in &config.states {
        if let Some(name) = child.name.as_deref().filter(|name| !name.is_empty()) {
            let fresh = children.insert(name);
            checks.push(check(fresh, || ConfigViolation::DuplicateState {
                path: path.to_string(),
                name: name.to_string(),
            }));
        }
    }

    if let Some(default) = &config.default_state {
        checks.push(check(children.contains(default.as_str()), || {
            ConfigViolation::UnknownDefaultState {
                path: path.to_string(),
                name: default.clone(),
            }
        }));
    }

    for (message, table) in &config.transitions {
        for (source, target) in table.rules() {
            let names = std::iter::once(source.as_str())
                .filter(|source| *source != "*" && *source != "null")
                .chain(target.as_deref());
            for name in names {
                checks.push(check(children.contains(name), || {
                    ConfigViolation::UnknownTransitionState {
                        path: path.to_string(),
                        message: message.clone(),
                        name: name.to_string(),
                    }
                }));
            }
        }
    }

    for method in &config.methods {
        checks.push(check(!method.name().is_empty(), || {
            ConfigViolation::EmptyMethodName {
                path: path.to_string(),
            }
        }));
        if let Some(default) = method.default_fn() {
            checks.push(check(loader.has_method(default), || {
                ConfigViolation::UnknownFunction {
                    path: path.to_string(),
                    name: default.to_string(),
                }
            }));
        }
    }

    for hook in [&config.enter, &config.exit].into_iter().flatten() {
        checks.push(check(loader.has_lifecycle(hook), || {
            ConfigViolation::UnknownFunction {
                path: path.to_string(),
                name: hook.clone(),
            }
        }));
    }

    for (index, child) in config.states.iter().enumerate() {
        let child_path = format!("{path}.{}", segment(child, index));
        check_state(child, &child_path, loader, checks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::config::{MethodConfig, TransitionConfig};

    #[test]
    fn valid_description_passes() {
        let config = StateConfig::named("light")
            .state(StateConfig::named("on"))
            .state(StateConfig::named("off"))
            .default_state("off")
            .transition(
                "toggle",
                TransitionConfig::new().rule("on", Some("off")).rule("off", Some("on")),
            );

        assert!(validate(&config, &StateLoader::new()).is_success());
    }

    #[test]
    fn validation_accumulates_all_violations() {
        let mut nameless = StateConfig::default();
        nameless.enter = Some("missingHook".to_string());

        let config = StateConfig::named("root")
            .state(StateConfig::named("a"))
            .state(StateConfig::named("a"))
            .state(nameless)
            .default_state("b")
            .transition("go", TransitionConfig::new().rule("x", Some("a")).rule("*", None))
            .method(MethodConfig::Detailed {
                name: "speak".to_string(),
                default: Some("nope".to_string()),
            });

        match validate(&config, &StateLoader::new()) {
            Validation::Failure(errors) => {
                assert_eq!(errors.len(), 6);
                assert!(errors.iter().any(|e| matches!(
                    e,
                    ConfigViolation::DuplicateState { name, .. } if name == "a"
                )));
                assert!(errors.iter().any(|e| matches!(
                    e,
                    ConfigViolation::UnknownDefaultState { name, .. } if name == "b"
                )));
                assert!(errors.iter().any(|e| matches!(
                    e,
                    ConfigViolation::UnknownTransitionState { name, .. } if name == "x"
                )));
                assert!(errors.iter().any(|e| matches!(
                    e,
                    ConfigViolation::InvalidIdentifier { path } if path == "root.states[2]"
                )));
                let unknown_functions = errors
                    .iter()
                    .filter(|e| matches!(e, ConfigViolation::UnknownFunction { .. }))
                    .count();
                assert_eq!(unknown_functions, 2);
            }
            Validation::Success(_) => panic!("Expected failures, got success"),
        }
    }

    #[test]
    fn missing_root_name_is_invalid_identifier() {
        let result = validate(&StateConfig::default(), &StateLoader::new());
        assert!(result.is_failure());
        if let Validation::Failure(errors) = result {
            assert!(errors
                .iter()
                .any(|e| matches!(e, ConfigViolation::InvalidIdentifier { .. })));
        }
    }
}
