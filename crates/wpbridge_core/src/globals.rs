//! Explicit global scope of the legacy runtime.
//!
//! Legacy code reads and writes process-wide variables. The bridge models
//! them as one [`GlobalScope`] value owned by the sandbox, so saving and
//! restoring them is a map operation.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

/// Callback registered on a hook. Filters return the filtered value;
/// actions return [`GlobalValue::Null`].
pub type HookCallback = Arc<dyn Fn(&[GlobalValue]) -> GlobalValue + Send + Sync>;

/// A value bound to a global name.
#[derive(Clone, Default)]
pub enum GlobalValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<GlobalValue>),
    Map(BTreeMap<String, GlobalValue>),
    /// A host object. Cloning shares the reference.
    Object(Arc<dyn Any + Send + Sync>),
}

impl GlobalValue {
    /// Wraps a host object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Borrows the wrapped host object as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(object) => object.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl PartialEq for GlobalValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            // Objects compare by identity.
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for GlobalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Self::Object(object) => write!(f, "Object({:p})", Arc::as_ptr(object)),
        }
    }
}

impl From<&str> for GlobalValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for GlobalValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for GlobalValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for GlobalValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for GlobalValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&serde_json::Value> for GlobalValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            Value::Object(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Kind of a hook registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Action,
    Filter,
}

/// A hook registration made by legacy code while capture mode was on.
#[derive(Clone)]
pub struct CapturedHook {
    pub tag: String,
    pub kind: HookKind,
    pub callback: HookCallback,
    pub priority: i32,
}

impl fmt::Debug for CapturedHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedHook")
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// The legacy runtime's global variables plus the hook capture state.
#[derive(Debug, Default)]
pub struct GlobalScope {
    bindings: HashMap<String, GlobalValue>,
    /// `Some` while capture mode is on.
    capture: Option<Vec<CapturedHook>>,
}

impl GlobalScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&GlobalValue> {
        self.bindings.get(name)
    }

    /// Value of `name`, or `default` when unset.
    pub fn get_or(&self, name: &str, default: GlobalValue) -> GlobalValue {
        self.bindings.get(name).cloned().unwrap_or(default)
    }

    /// Binds `name`, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<GlobalValue>) -> Option<GlobalValue> {
        self.bindings.insert(name.into(), value.into())
    }

    /// Removes `name`, returning its value.
    pub fn unset(&mut self, name: &str) -> Option<GlobalValue> {
        self.bindings.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Registers an action on behalf of legacy code.
    ///
    /// Only accepted in capture mode; returns whether it was captured.
    pub fn add_action(&mut self, tag: impl Into<String>, callback: HookCallback, priority: i32) -> bool {
        self.capture_hook(tag.into(), HookKind::Action, callback, priority)
    }

    /// Registers a filter on behalf of legacy code.
    ///
    /// Only accepted in capture mode; returns whether it was captured.
    pub fn add_filter(&mut self, tag: impl Into<String>, callback: HookCallback, priority: i32) -> bool {
        self.capture_hook(tag.into(), HookKind::Filter, callback, priority)
    }

    fn capture_hook(&mut self, tag: String, kind: HookKind, callback: HookCallback, priority: i32) -> bool {
        match &mut self.capture {
            Some(buffer) => {
                buffer.push(CapturedHook {
                    tag,
                    kind,
                    callback,
                    priority,
                });
                true
            }
            None => {
                warn!("Hook '{}' registered outside a sandboxed run; ignored", tag);
                false
            }
        }
    }

    pub(crate) fn begin_capture(&mut self) {
        self.capture = Some(Vec::new());
    }

    /// Turns capture mode off and returns what was captured.
    pub(crate) fn end_capture(&mut self) -> Vec<CapturedHook> {
        self.capture.take().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> HookCallback {
        Arc::new(|_| GlobalValue::Null)
    }

    #[test]
    fn test_set_get_unset() {
        let mut scope = GlobalScope::new();
        assert_eq!(scope.set("current_user", "X"), None);
        assert_eq!(scope.set("current_user", "Y"), Some(GlobalValue::from("X")));
        assert_eq!(scope.get("current_user").and_then(GlobalValue::as_str), Some("Y"));
        assert_eq!(scope.get_or("missing", GlobalValue::Int(3)), GlobalValue::Int(3));
        assert_eq!(scope.unset("current_user"), Some(GlobalValue::from("Y")));
        assert!(!scope.contains("current_user"));
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let a = GlobalValue::object(String::from("db"));
        let b = GlobalValue::object(String::from("db"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("db"));
    }

    #[test]
    fn test_hooks_refused_outside_capture() {
        let mut scope = GlobalScope::new();
        assert!(!scope.add_action("init", noop(), 10));

        scope.begin_capture();
        assert!(scope.add_action("init", noop(), 10));
        assert!(scope.add_filter("the_title", noop(), 5));
        let captured = scope.end_capture();

        assert_eq!(captured.len(), 2);
        assert_eq!(captured[1].kind, HookKind::Filter);
        assert!(!scope.is_capturing());
    }

    #[test]
    fn test_from_json() {
        let value = GlobalValue::from(&json!({ "id": 1, "roles": ["admin"], "ratio": 0.5 }));
        let GlobalValue::Map(entries) = value else {
            panic!("expected a map");
        };
        assert_eq!(entries["id"], GlobalValue::Int(1));
        assert_eq!(entries["roles"], GlobalValue::List(vec!["admin".into()]));
        assert_eq!(entries["ratio"], GlobalValue::Float(0.5));
    }
}
