//! Transformer error types.

use thiserror::Error;

/// Errors raised while building or running transformers.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The declaration names a type the factory does not know.
    #[error("Unknown transformer type '{kind}' for '{id}'")]
    UnknownType { id: String, kind: String },

    /// The declaration has no type and nothing to inherit one from.
    #[error("Transformer '{id}' declares no type")]
    MissingType { id: String },

    /// The declaration's options do not fit its type.
    #[error("Invalid options for '{id}': {message}")]
    InvalidOptions { id: String, message: String },

    /// A transformer failed while rewriting source.
    #[error("Transform failed in '{id}': {message}")]
    Failed { id: String, message: String },

    /// A declared pattern did not compile.
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl TransformError {
    /// Creates an invalid options error.
    pub fn invalid_options(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates a transform failure.
    pub fn failed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            id: id.into(),
            message: message.into(),
        }
    }
}
