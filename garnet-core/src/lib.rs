//!
//! This crate contains common types that are useful to be shared across multiple tools when manipulating Garnet-related things.
//!

/// The Garnet Abstract Syntax Tree definitions.
pub mod ast;
/// Syntax errors, shared by the lexer and the parser.
pub mod error;
/// Source locations.
pub mod location;

pub use crate::error::SyntaxError;
pub use crate::location::{Location, LocationDetail};
