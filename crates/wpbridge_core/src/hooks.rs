//! Host hook manager seam.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{GlobalValue, HookCallback, HookKind};

/// The host framework's hook manager. Captured legacy hooks are promoted
/// into it by [`IsolationSandbox::resolve`](crate::IsolationSandbox::resolve).
pub trait HookManager: Send + Sync {
    fn add_action(&self, tag: &str, callback: HookCallback, priority: i32);

    fn add_filter(&self, tag: &str, callback: HookCallback, priority: i32);

    /// Runs the filters on `tag` over `value`. Each callback receives the
    /// current value followed by `args`.
    fn apply_filters(&self, tag: &str, value: GlobalValue, args: &[GlobalValue]) -> GlobalValue;

    fn do_action(&self, tag: &str, args: &[GlobalValue]);
}

#[derive(Clone)]
struct Registered {
    kind: HookKind,
    callback: HookCallback,
    priority: i32,
}

/// In-process [`HookManager`].
///
/// Callbacks run in ascending priority; equal priorities run in
/// registration order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<HashMap<String, Vec<Registered>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, tag: &str, kind: HookKind, callback: HookCallback, priority: i32) {
        let mut hooks = self.hooks.write();
        let registered = hooks.entry(tag.to_string()).or_default();
        let position = registered.partition_point(|r| r.priority <= priority);
        registered.insert(
            position,
            Registered {
                kind,
                callback,
                priority,
            },
        );
    }

    /// Snapshot of the callbacks on `tag`, so they run without the lock held.
    fn callbacks(&self, tag: &str, kind: HookKind) -> Vec<HookCallback> {
        self.hooks
            .read()
            .get(tag)
            .map(|registered| {
                registered
                    .iter()
                    .filter(|r| r.kind == kind)
                    .map(|r| HookCallback::clone(&r.callback))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of callbacks of `kind` on `tag`.
    pub fn count(&self, tag: &str, kind: HookKind) -> usize {
        self.hooks
            .read()
            .get(tag)
            .map_or(0, |registered| registered.iter().filter(|r| r.kind == kind).count())
    }

    pub fn has_action(&self, tag: &str) -> bool {
        self.count(tag, HookKind::Action) > 0
    }

    pub fn has_filter(&self, tag: &str) -> bool {
        self.count(tag, HookKind::Filter) > 0
    }
}

impl HookManager for HookRegistry {
    fn add_action(&self, tag: &str, callback: HookCallback, priority: i32) {
        self.add(tag, HookKind::Action, callback, priority);
    }

    fn add_filter(&self, tag: &str, callback: HookCallback, priority: i32) {
        self.add(tag, HookKind::Filter, callback, priority);
    }

    fn apply_filters(&self, tag: &str, value: GlobalValue, args: &[GlobalValue]) -> GlobalValue {
        self.callbacks(tag, HookKind::Filter)
            .into_iter()
            .fold(value, |current, callback| {
                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(current);
                call_args.extend_from_slice(args);
                callback(&call_args)
            })
    }

    fn do_action(&self, tag: &str, args: &[GlobalValue]) {
        for callback in self.callbacks(tag, HookKind::Action) {
            callback(args);
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks = self.hooks.read();
        let mut tags: Vec<&String> = hooks.keys().collect();
        tags.sort();
        f.debug_struct("HookRegistry").field("tags", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_filters_run_in_priority_order() {
        let registry = HookRegistry::new();
        let append = |suffix: &'static str| -> HookCallback {
            Arc::new(move |args| {
                let current = args[0].as_str().unwrap_or_default();
                GlobalValue::from(format!("{current}{suffix}"))
            })
        };
        registry.add_filter("the_title", append("-late"), 20);
        registry.add_filter("the_title", append("-first"), 5);
        registry.add_filter("the_title", append("-second"), 5);

        let filtered = registry.apply_filters("the_title", "Hello".into(), &[]);
        assert_eq!(filtered.as_str(), Some("Hello-first-second-late"));
    }

    #[test]
    fn test_actions_receive_args() {
        let registry = HookRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.add_action(
            "save_post",
            Arc::new(move |args| {
                sink.lock().push(args[0].as_int().unwrap_or_default());
                GlobalValue::Null
            }),
            10,
        );

        registry.do_action("save_post", &[GlobalValue::Int(42)]);
        registry.do_action("unknown", &[]);

        assert_eq!(*seen.lock(), vec![42]);
        assert!(registry.has_action("save_post"));
        assert!(!registry.has_filter("save_post"));
    }

    #[test]
    fn test_filter_without_callbacks_returns_value() {
        let registry = HookRegistry::new();
        assert_eq!(registry.apply_filters("x", GlobalValue::Int(1), &[]), GlobalValue::Int(1));
    }
}
