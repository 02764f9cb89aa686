//! VAMOS Core - AST, symbol environment and semantic validation
//!
//! This crate provides the foundational types for the VAMOS compiler.

pub mod ast;
pub mod env;
pub mod span;
pub mod types;
pub mod validate;

pub use ast::*;
pub use env::{ComponentIndex, Environment, HOLE_KIND};
pub use span::Span;
pub use types::FieldType;
