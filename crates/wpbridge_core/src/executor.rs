//! Host runtime seam.
//!
//! The bridge prepares legacy code (transforms, caches, sandboxes) but does
//! not interpret it. Execution is delegated to a [`LegacyExecutor`]
//! provided by the embedding runtime.

use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::GlobalScope;

/// Errors raised by a host runtime while executing legacy code.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The legacy code itself failed.
    #[error("{unit} failed: {message}")]
    Failed { unit: String, message: String },

    /// The runtime cannot execute this kind of unit.
    #[error("Unsupported unit {0}")]
    Unsupported(String),
}

impl ExecutorError {
    pub fn failed(unit: &LegacyUnit<'_>, message: impl Into<String>) -> Self {
        Self::Failed {
            unit: unit.to_string(),
            message: message.into(),
        }
    }
}

/// A unit of code handed to the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyUnit<'a> {
    /// A compiled artifact (or untransformed legacy file) to include.
    File(&'a Path),
    /// Host-native code, included directly with full trust.
    Native(&'a Path),
    /// Transformed source evaluated without a backing file. Only produced
    /// when the eval fallback is enabled.
    Source { code: &'a str, origin: &'a Path },
}

impl LegacyUnit<'_> {
    /// Path the unit came from.
    pub fn origin(&self) -> &Path {
        match self {
            Self::File(path) | Self::Native(path) => path,
            Self::Source { origin, .. } => origin,
        }
    }
}

impl fmt::Display for LegacyUnit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Native(path) => write!(f, "native file {}", path.display()),
            Self::Source { origin, .. } => write!(f, "evaluated source of {}", origin.display()),
        }
    }
}

/// Executes legacy code against the global scope.
pub trait LegacyExecutor: Send + Sync {
    fn execute(&self, unit: LegacyUnit<'_>, scope: &mut GlobalScope) -> Result<(), ExecutorError>;
}

impl<F> LegacyExecutor for F
where
    F: Fn(LegacyUnit<'_>, &mut GlobalScope) -> Result<(), ExecutorError> + Send + Sync,
{
    fn execute(&self, unit: LegacyUnit<'_>, scope: &mut GlobalScope) -> Result<(), ExecutorError> {
        self(unit, scope)
    }
}

/// Executor that only logs what it would run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExecutor;

impl LegacyExecutor for NullExecutor {
    fn execute(&self, unit: LegacyUnit<'_>, _scope: &mut GlobalScope) -> Result<(), ExecutorError> {
        info!("Would execute {}", unit);
        Ok(())
    }
}
