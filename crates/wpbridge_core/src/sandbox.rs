//! Isolation sandbox around one unit of legacy execution.
//!
//! A run snapshots the protected globals, injects the caller's context,
//! turns on hook capture, executes, then restores every snapshotted name to
//! its prior value (or removes it if it was absent). Restoration happens in
//! a guard's `Drop`, so it runs on error returns and panics alike.
//!
//! Names outside the snapshot that the legacy code creates are kept unless
//! `purge_new_globals` is enabled, which diffs the whole scope on exit.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::{CapturedHook, GlobalScope, GlobalValue, HookKind, HookManager};

/// Globals snapshotted around every run.
pub const DEFAULT_PROTECTED_GLOBALS: [&str; 7] = [
    "wp_filter",
    "wp_actions",
    "wp_current_filter",
    "current_user",
    "wpdb",
    "post",
    "wp_query",
];

/// Hooks captured under this tag run during `resolve` instead of being
/// promoted, so the menu exists for the current request's render.
pub const ADMIN_MENU_TAG: &str = "admin_menu";

/// Runs legacy code against a shared [`GlobalScope`] with guaranteed
/// restoration of the protected globals.
pub struct IsolationSandbox {
    scope: Mutex<GlobalScope>,
    hooks: Arc<dyn HookManager>,
    protected: Vec<String>,
    purge_new_globals: bool,
    captured: Mutex<Vec<CapturedHook>>,
}

impl IsolationSandbox {
    pub fn new(hooks: Arc<dyn HookManager>) -> Self {
        Self {
            scope: Mutex::new(GlobalScope::new()),
            hooks,
            protected: DEFAULT_PROTECTED_GLOBALS.iter().map(|s| s.to_string()).collect(),
            purge_new_globals: false,
            captured: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the protected name list.
    pub fn with_protected_globals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected = names.into_iter().map(Into::into).collect();
        self
    }

    /// Removes globals created during a run that did not exist before it.
    pub fn with_purge_new_globals(mut self, purge: bool) -> Self {
        self.purge_new_globals = purge;
        self
    }

    pub fn protected_globals(&self) -> &[String] {
        &self.protected
    }

    pub fn hooks(&self) -> &Arc<dyn HookManager> {
        &self.hooks
    }

    /// Locks the global scope for direct access between runs.
    ///
    /// Must not be held across a call to [`run`](Self::run).
    pub fn scope(&self) -> MutexGuard<'_, GlobalScope> {
        self.scope.lock()
    }

    /// Clone of the current value of `name`.
    pub fn global(&self, name: &str) -> Option<GlobalValue> {
        self.scope.lock().get(name).cloned()
    }

    /// Runs `body` inside the sandbox.
    ///
    /// The scope lock is held for the whole save, inject, execute and
    /// restore sequence, so overlapping runs are serialized. `body` must not
    /// call back into this sandbox.
    pub fn run<T, E, F, I, K>(&self, context: I, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut GlobalScope) -> Result<T, E>,
        I: IntoIterator<Item = (K, GlobalValue)>,
        K: Into<String>,
    {
        let mut scope = self.scope.lock();
        let mut guard = RestoreGuard::enter(
            &mut scope,
            &self.protected,
            self.purge_new_globals,
            &self.captured,
        );

        for (name, value) in context {
            guard.inject(name.into(), value);
        }
        guard.scope.begin_capture();

        body(&mut *guard.scope)
    }

    /// Hooks captured since the last [`resolve`](Self::resolve).
    pub fn capture_hooks(&self) -> Vec<CapturedHook> {
        self.captured.lock().clone()
    }

    /// Promotes captured hooks into the host hook manager and clears the
    /// capture buffer. Returns the number of hooks handled.
    pub fn resolve(&self) -> usize {
        let captured = std::mem::take(&mut *self.captured.lock());
        let count = captured.len();

        for hook in captured {
            if hook.tag == ADMIN_MENU_TAG {
                debug!("Running captured {} callback immediately", ADMIN_MENU_TAG);
                (hook.callback)(&[]);
                continue;
            }
            match hook.kind {
                HookKind::Filter => self.hooks.add_filter(&hook.tag, hook.callback, hook.priority),
                HookKind::Action => self.hooks.add_action(&hook.tag, hook.callback, hook.priority),
            }
        }

        if count > 0 {
            debug!("Promoted {} captured hooks", count);
        }
        count
    }

    /// Drops captured hooks without promoting them, e.g. after the unit
    /// that registered them failed. Returns how many were dropped.
    pub fn discard_captured(&self) -> usize {
        std::mem::take(&mut *self.captured.lock()).len()
    }
}

impl std::fmt::Debug for IsolationSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationSandbox")
            .field("protected", &self.protected)
            .field("purge_new_globals", &self.purge_new_globals)
            .field("captured", &self.captured.lock().len())
            .finish_non_exhaustive()
    }
}

/// Snapshot of one run. Restores the scope when dropped.
struct RestoreGuard<'a> {
    scope: &'a mut GlobalScope,
    /// Prior value per snapshotted name; `None` means it was absent.
    snapshot: Vec<(String, Option<GlobalValue>)>,
    /// Every name bound at entry, when purging is enabled.
    names_at_entry: Option<HashSet<String>>,
    captured: &'a Mutex<Vec<CapturedHook>>,
}

impl<'a> RestoreGuard<'a> {
    fn enter(
        scope: &'a mut GlobalScope,
        protected: &[String],
        purge: bool,
        captured: &'a Mutex<Vec<CapturedHook>>,
    ) -> Self {
        let snapshot = protected
            .iter()
            .map(|name| (name.clone(), scope.get(name).cloned()))
            .collect();
        let names_at_entry = purge.then(|| scope.names().map(str::to_string).collect());

        Self {
            scope,
            snapshot,
            names_at_entry,
            captured,
        }
    }

    /// Binds a context value. The name joins the snapshot so it is restored
    /// like a protected global.
    fn inject(&mut self, name: String, value: GlobalValue) {
        if !self.snapshot.iter().any(|(n, _)| *n == name) {
            let prior = self.scope.get(&name).cloned();
            self.snapshot.push((name.clone(), prior));
        }
        self.scope.set(name, value);
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        let hooks = self.scope.end_capture();
        if !hooks.is_empty() {
            self.captured.lock().extend(hooks);
        }

        for (name, prior) in self.snapshot.drain(..) {
            match prior {
                Some(value) => {
                    self.scope.set(name, value);
                }
                None => {
                    self.scope.unset(&name);
                }
            }
        }

        if let Some(names_at_entry) = &self.names_at_entry {
            let created: Vec<String> = self
                .scope
                .names()
                .filter(|name| !names_at_entry.contains(*name))
                .map(str::to_string)
                .collect();
            for name in created {
                debug!("Purging global '{}' created during sandboxed run", name);
                self.scope.unset(&name);
            }
        }
    }
}
