//! Expression engine for the target template language.
//!
//! Expressions are immutable trees that render to text given a [`Context`]
//! (indentation depth and line position). Rendering is pure: the same
//! expression rendered twice from the same context yields the same text.

/// Text-producing expression tree.
pub mod expr;
/// Compile-time literals and their JSON encoding.
pub mod literal;

pub use expr::{Context, Expr, Rendered};
pub use literal::Literal;
