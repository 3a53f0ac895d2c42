//! # wpbridge_core
//!
//! Runs legacy extension code on top of the host framework.
//!
//! This crate provides:
//! - The `TransformerEngine` and transformer discovery
//! - The isolation sandbox around legacy globals and hooks
//! - Class-load and stream interception
//! - The module loader and the `Bridge` wiring
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wpbridge_core::{Bridge, BridgeConfig, NullExecutor};
//!
//! let config = BridgeConfig::from_file("bridge.json")?;
//! let bridge = Bridge::new(config, Arc::new(NullExecutor))?;
//!
//! let report = bridge.boot();
//! for (path, reason) in &report.failed {
//!     eprintln!("{}: {}", path.display(), reason);
//! }
//! ```

mod autoload;
mod bridge;
mod config;
mod context;
mod engine;
mod error;
mod executor;
mod globals;
mod hooks;
pub mod loader;
pub mod module_loader;
pub mod registry;
mod sandbox;
pub mod stream;
pub mod warm;

pub use autoload::{
    AutoloadInterceptor, CLASS_SUBDIRS, ClassResolver, ClassResolverChain, Interceptor,
    class_to_file,
};
pub use bridge::{Bridge, open_storage};
pub use config::{BridgeConfig, CONFIG_FILES, CacheBackendKind, CacheConfig, InterceptionMode};
pub use context::ContextFactory;
pub use engine::{CompiledUnit, SharedEngine, TransformerEngine, extension_tag};
pub use error::BridgeError;
pub use executor::{ExecutorError, LegacyExecutor, LegacyUnit, NullExecutor};
pub use globals::{CapturedHook, GlobalScope, GlobalValue, HookCallback, HookKind};
pub use hooks::{HookManager, HookRegistry};
pub use loader::{Discovery, TransformerLoader, core_declarations};
pub use module_loader::{LoadReport, ModuleLoader};
pub use registry::{BuiltinRegistry, FileRegistry, RegistrySource};
pub use sandbox::{ADMIN_MENU_TAG, DEFAULT_PROTECTED_GLOBALS, IsolationSandbox};
pub use stream::{StreamHandle, StreamInterceptor};
pub use warm::warm_cache;
