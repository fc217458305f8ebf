//! Stagewright: a resolver-pipeline compiler for GraphQL APIs
//!
//! This crate turns typed, step-by-step resolver programs into mapping
//! templates:
//! - Typed values whose operators build template expressions instead of
//!   computing anything
//! - Resumable programs that suspend on write, stash, call, loop and branch
//!   statements
//! - An interpreter that splits a field's program into data-source stages
//!   and assembles unit or pipeline resolvers
//! - Schema text generation with auth, subscription and input blocks
//! - JSON manifests and a CLI for compiling whole APIs

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Whole-API compilation
pub mod api;
/// Field compilation: interpreter, stages and caching
pub mod compiler;
/// Compiler configuration
pub mod config;
/// Data-source references and request envelopes
pub mod data_source;
/// Error types
pub mod error;
/// Manifest decoding and lowering
pub mod manifest;
/// Resolver programs and statements
pub mod program;
/// GraphQL schema generation
pub mod schema;
/// Shapes (type descriptors) and the type catalog
pub mod shape;
/// Template expressions and JSON literals
pub mod template;
/// Typed values and their operators
pub mod value;

// Re-export key types for convenience
pub use api::{Api, CompiledApi, FieldResolver};
pub use compiler::{CompiledResolver, ResolverPipeline, Stage, compile_field};
pub use config::{CompilerConfig, PartialBranchResults};
pub use data_source::DataSource;
pub use error::{CompileError, FieldFailure, ManifestError, SchemaError};
pub use manifest::Manifest;
pub use program::{Program, Statement, Step, Thrown};
pub use shape::{RecordShape, Shape, TypeCatalog};
pub use value::TypedValue;

/// Current version of Stagewright
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
