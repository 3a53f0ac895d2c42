//! # wpbridge_transform
//!
//! Source rewriting building blocks for the bridge.
//!
//! This crate provides:
//! - The `Transformer` and `Requirement` capability traits
//! - The keyword lexer and `PatternIndex` used to select transformers
//! - `TransformerRepository`, the id to instance registry
//! - `TransformerFactory`, which turns declarations into instances
//! - The built-in transformers
//!
//! ## Example
//!
//! ```rust,ignore
//! use wpbridge_transform::{PatternIndex, TransformerFactory, TransformerRepository};
//! use wpbridge_manifest::TransformerConfig;
//!
//! let factory = TransformerFactory::default();
//! let repository = TransformerRepository::new();
//! let mut index = PatternIndex::new();
//!
//! let config = TransformerConfig::new("wpdb_direct_query", "wpdb_direct_query", &["$wpdb"]);
//! repository.register(&config.id, factory.build(&config)?);
//! index.index_transformer(&config.id, &config.keywords);
//! ```

mod context;
mod error;
mod factory;
mod index;
pub mod lexer;
mod repository;
mod requirement;
mod transformer;
pub mod transformers;

pub use context::Context;
pub use error::TransformError;
pub use factory::{Constructor, TransformerFactory};
pub use index::PatternIndex;
pub use repository::{TransformerRepository, TransformerSource};
pub use requirement::{ExtensionRequirement, Requirement};
pub use transformer::{DeclaredTransformer, Transformer};
