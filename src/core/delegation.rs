//! Delegated methods.
//!
//! A delegated method is registered on a node by name. Calling it walks
//! the node's active chain and runs the first own implementation found
//! there, falling back to the node's default. Optional `before` and
//! `after` hooks bracket whichever body runs.

use super::error::StateError;
use super::node::StateNode;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Body of a method: receives the node it is bound to and the call arguments.
pub type Method = Rc<dyn Fn(&StateNode, &[Value]) -> Result<Value, StateError>>;

/// A `before`/`after` hook; its return value is discarded.
pub type Hook = Rc<dyn Fn(&StateNode, &[Value]) -> Result<(), StateError>>;

/// Wrap a closure as a [`Method`].
pub fn method<F>(f: F) -> Method
where
    F: Fn(&StateNode, &[Value]) -> Result<Value, StateError> + 'static,
{
    Rc::new(f)
}

/// Wrap a closure as a [`Hook`].
pub fn hook<F>(f: F) -> Hook
where
    F: Fn(&StateNode, &[Value]) -> Result<(), StateError> + 'static,
{
    Rc::new(f)
}

/// A method body that may carry its own name.
#[derive(Clone)]
pub struct NamedFn {
    name: Option<String>,
    body: Method,
}

impl NamedFn {
    pub fn named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&StateNode, &[Value]) -> Result<Value, StateError> + 'static,
    {
        Self {
            name: Some(name.into()),
            body: Rc::new(f),
        }
    }

    pub fn anonymous<F>(f: F) -> Self
    where
        F: Fn(&StateNode, &[Value]) -> Result<Value, StateError> + 'static,
    {
        Self {
            name: None,
            body: Rc::new(f),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// How a delegated method is named when registered.
#[derive(Clone)]
pub enum MethodSpec {
    Name(String),
    /// The function's name becomes the method name and its body the default.
    Function(NamedFn),
}

impl From<&str> for MethodSpec {
    fn from(name: &str) -> Self {
        MethodSpec::Name(name.to_string())
    }
}

impl From<String> for MethodSpec {
    fn from(name: String) -> Self {
        MethodSpec::Name(name)
    }
}

impl From<NamedFn> for MethodSpec {
    fn from(f: NamedFn) -> Self {
        MethodSpec::Function(f)
    }
}

struct DispatcherInner {
    name: String,
    default: RefCell<Option<Method>>,
    before: RefCell<Option<Hook>>,
    after: RefCell<Option<Hook>>,
}

/// Handle to a delegated method registered on a node.
///
/// The hooks and default are shared with the node, so setting them
/// through any clone of the handle affects later calls.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Rc<DispatcherInner>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.inner.name)
            .field("has_default", &self.inner.default.borrow().is_some())
            .field("has_before", &self.inner.before.borrow().is_some())
            .field("has_after", &self.inner.after.borrow().is_some())
            .finish()
    }
}

impl Dispatcher {
    fn new(name: String) -> Self {
        Self {
            inner: Rc::new(DispatcherInner {
                name,
                default: RefCell::new(None),
                before: RefCell::new(None),
                after: RefCell::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn default_impl(&self) -> Option<Method> {
        self.inner.default.borrow().clone()
    }

    pub fn set_default(&self, default: Option<Method>) {
        self.inner.default.replace(default);
    }

    pub fn set_before(&self, hook: Hook) {
        self.inner.before.replace(Some(hook));
    }

    pub fn clear_before(&self) {
        self.inner.before.replace(None);
    }

    pub fn set_after(&self, hook: Hook) {
        self.inner.after.replace(Some(hook));
    }

    pub fn clear_after(&self) {
        self.inner.after.replace(None);
    }

    /// First node below `node` on its active chain with an own
    /// implementation of this method.
    pub fn resolve(&self, node: &StateNode) -> Option<(StateNode, Method)> {
        let mut next = node.current_state();
        while let Some(candidate) = next {
            if let Some(body) = candidate.own_method(&self.inner.name) {
                return Some((candidate, body));
            }
            next = candidate.current_state();
        }
        None
    }

    /// Run the method as called on `node`.
    pub fn invoke(&self, node: &StateNode, args: &[Value]) -> Result<Value, StateError> {
        let resolved = self.resolve(node);
        let before = self.inner.before.borrow().clone();
        let after = self.inner.after.borrow().clone();

        if let Some(before) = before {
            before(node, args)?;
        }

        let result = match resolved {
            Some((target, body)) => {
                trace!(method = %self.inner.name, node = %node, target = %target, "delegating");
                body(&target, args)?
            }
            None => match self.default_impl() {
                Some(default) => {
                    trace!(method = %self.inner.name, node = %node, "using default");
                    default(node, args)?
                }
                None => Value::Null,
            },
        };

        if let Some(after) = after {
            after(node, args)?;
        }

        Ok(result)
    }
}

impl StateNode {
    /// Register a delegated method, returning its [`Dispatcher`].
    ///
    /// Registering a name again keeps the existing dispatcher (and its
    /// hooks) and only replaces the default.
    pub fn add_state_method(
        &self,
        spec: impl Into<MethodSpec>,
        default: Option<Method>,
    ) -> Result<Dispatcher, StateError> {
        let (name, default) = match spec.into() {
            MethodSpec::Name(name) => (name, default),
            MethodSpec::Function(NamedFn { name, body }) => match name {
                Some(name) if !name.is_empty() => (name, Some(body)),
                _ => return Err(StateError::AnonymousFunction),
            },
        };
        if name.is_empty() {
            return Err(StateError::InvalidIdentifier);
        }

        let dispatcher = self
            .inner
            .dispatchers
            .borrow_mut()
            .entry(name.clone())
            .or_insert_with(|| Dispatcher::new(name))
            .clone();
        dispatcher.set_default(default);
        Ok(dispatcher)
    }

    pub fn dispatcher(&self, name: &str) -> Option<Dispatcher> {
        self.inner.dispatchers.borrow().get(name).cloned()
    }

    /// Give this node its own implementation of `name`.
    pub fn define_method<F>(&self, name: impl Into<String>, f: F) -> Result<(), StateError>
    where
        F: Fn(&StateNode, &[Value]) -> Result<Value, StateError> + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(StateError::InvalidIdentifier);
        }
        self.inner.own_methods.borrow_mut().insert(name, Rc::new(f));
        Ok(())
    }

    pub fn has_own_method(&self, name: &str) -> bool {
        self.inner.own_methods.borrow().contains_key(name)
    }

    pub(crate) fn own_method(&self, name: &str) -> Option<Method> {
        self.inner.own_methods.borrow().get(name).cloned()
    }

    /// Call `name` on this node.
    ///
    /// An own implementation runs directly; otherwise the registered
    /// delegated method dispatches down the active chain. A name that is
    /// neither is [`StateError::UnknownMethod`].
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, StateError> {
        if let Some(body) = self.own_method(name) {
            return body(self, args);
        }
        match self.dispatcher(name) {
            Some(dispatcher) => dispatcher.invoke(self, args),
            None => Err(StateError::UnknownMethod {
                name: name.to_string(),
                state: self.display_name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sum(_: &StateNode, args: &[Value]) -> Result<Value, StateError> {
        Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
    }

    #[test]
    fn calls_active_child_implementation() {
        let obj = StateNode::new("obj");
        let a = obj.add_substate("a").unwrap();
        a.define_method("calculate", sum).unwrap();
        obj.add_state_method("calculate", None).unwrap();

        obj.set_current_state(&a).unwrap();
        let result = obj.call("calculate", &[json!(1), json!(2), json!(3)]).unwrap();
        assert_eq!(result, json!(6));
    }

    #[test]
    fn falls_back_to_default_then_null() {
        let obj = StateNode::new("obj");
        obj.add_substate("a").unwrap();
        obj.add_state_method("test", Some(method(|_, _| Ok(json!("default")))))
            .unwrap();
        obj.add_state_method("sayHello", None).unwrap();

        assert_eq!(obj.call("test", &[]).unwrap(), json!("default"));
        obj.set_current_state("a").unwrap();
        assert_eq!(obj.call("test", &[]).unwrap(), json!("default"));
        assert_eq!(obj.call("sayHello", &[json!("world")]).unwrap(), Value::Null);
    }

    #[test]
    fn implementation_is_bound_to_defining_node() {
        let obj = StateNode::new("obj");
        let a = obj.add_substate("a").unwrap();
        a.define_method("whoami", |node: &StateNode, _: &[Value]| {
            Ok(json!(node.identifier()))
        })
        .unwrap();
        obj.add_state_method("whoami", Some(method(|node, _| Ok(json!(node.identifier())))))
            .unwrap();

        assert_eq!(obj.call("whoami", &[]).unwrap(), json!("obj"));
        obj.set_current_state(&a).unwrap();
        assert_eq!(obj.call("whoami", &[]).unwrap(), json!("a"));
    }

    #[test]
    fn delegation_skips_intermediate_nodes() {
        let root = StateNode::new("root");
        let child = root.add_substate("child").unwrap();
        let grandchild = child.add_substate("grandchild").unwrap();
        root.add_state_method("speak", None).unwrap();
        child.add_state_method("speak", None).unwrap();
        grandchild
            .define_method("speak", |_: &StateNode, _: &[Value]| Ok(json!("deep")))
            .unwrap();

        root.set_current_state(&child).unwrap();
        child.set_current_state(&grandchild).unwrap();

        assert_eq!(root.call("speak", &[]).unwrap(), json!("deep"));
        assert_eq!(child.call("speak", &[]).unwrap(), json!("deep"));
    }

    #[test]
    fn before_and_after_bracket_the_call() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let obj = StateNode::new("obj");
        let a = obj.add_substate("a").unwrap();
        let sink = log.clone();
        a.define_method("run", move |_: &StateNode, _: &[Value]| {
            sink.borrow_mut().push("body");
            Ok(Value::Null)
        })
        .unwrap();

        let dispatcher = obj.add_state_method("run", None).unwrap();
        let sink = log.clone();
        dispatcher.set_before(hook(move |_, _| {
            sink.borrow_mut().push("before");
            Ok(())
        }));
        let sink = log.clone();
        dispatcher.set_after(hook(move |_, _| {
            sink.borrow_mut().push("after");
            Ok(())
        }));

        // re-registration keeps the hooks
        let sink = log.clone();
        obj.add_state_method(
            "run",
            Some(method(move |_, _| {
                sink.borrow_mut().push("default");
                Ok(Value::Null)
            })),
        )
        .unwrap();

        obj.call("run", &[]).unwrap();
        obj.set_current_state(&a).unwrap();
        obj.call("run", &[]).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["before", "default", "after", "before", "body", "after"]
        );
    }

    #[test]
    fn named_function_supplies_name_and_default() {
        let obj = StateNode::new("obj");
        let dispatcher = obj
            .add_state_method(NamedFn::named("greet", |_, _| Ok(json!("hi"))), None)
            .unwrap();
        assert_eq!(dispatcher.name(), "greet");
        assert_eq!(obj.call("greet", &[]).unwrap(), json!("hi"));
    }

    #[test]
    fn anonymous_function_is_rejected() {
        let obj = StateNode::new("obj");
        let result = obj.add_state_method(NamedFn::anonymous(|_, _| Ok(Value::Null)), None);
        assert_eq!(result.unwrap_err(), StateError::AnonymousFunction);
        assert_eq!(
            obj.add_state_method("", None).unwrap_err(),
            StateError::InvalidIdentifier
        );
    }

    #[test]
    fn own_method_shadows_delegation() {
        let obj = StateNode::new("obj");
        let a = obj.add_substate("a").unwrap();
        a.define_method("name", |_: &StateNode, _: &[Value]| Ok(json!("a")))
            .unwrap();
        obj.define_method("name", |_: &StateNode, _: &[Value]| Ok(json!("obj")))
            .unwrap();
        obj.add_state_method("name", None).unwrap();
        obj.set_current_state(&a).unwrap();

        assert!(obj.has_own_method("name"));
        assert_eq!(obj.call("name", &[]).unwrap(), json!("obj"));
    }

    #[test]
    fn unknown_method_is_an_error() {
        let obj = StateNode::new("obj");
        assert!(matches!(
            obj.call("missing", &[]),
            Err(StateError::UnknownMethod { .. })
        ));
    }
}
