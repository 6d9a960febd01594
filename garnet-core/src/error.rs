use thiserror::Error;

use crate::location::Location;

/// A malformed-input error, produced by the lexer or the parser.
///
/// Syntax errors are always fatal to the surrounding parse and are never visible to guest code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {message}")]
pub struct SyntaxError {
    /// Where the offending input starts.
    pub location: Location,
    /// A human-readable description of the problem.
    pub message: String,
}

impl SyntaxError {
    /// Construct a syntax error at a given location.
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}
