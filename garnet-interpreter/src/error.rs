use thiserror::Error;

use garnet_core::SyntaxError;

/// The host-facing error for everything that can go wrong while running Garnet code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The source code could not be parsed.
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    /// A guest exception reached the top level without being rescued.
    #[error("{}{message} ({class})", render_location(.location))]
    Runtime {
        /// The name of the exception's class.
        class: String,
        /// The exception's message.
        message: String,
        /// Where the exception was raised, rendered according to the configuration.
        location: Option<String>,
    },
    /// An interpreter invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
    /// The host interop boundary was misused.
    #[error("interop error: {0}")]
    Interop(String),
    /// The running thread was asked to stop.
    #[error("execution cancelled")]
    Cancelled,
    /// The maximum call depth was exceeded.
    #[error("stack level too deep (more than {depth} nested calls)")]
    StackOverflow {
        /// The configured maximum call depth.
        depth: usize,
    },
}

impl Error {
    /// Whether this error was caused by the guest program (as opposed to a bug in the interpreter or its embedding).
    pub fn is_guest_error(&self) -> bool {
        matches!(
            self,
            Self::Syntax(_) | Self::Runtime { .. } | Self::StackOverflow { .. }
        )
    }

    /// The guest exception class name, for runtime errors.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Runtime { class, .. } => Some(class.as_str()),
            _ => None,
        }
    }
}

fn render_location(location: &Option<String>) -> String {
    match location {
        Some(location) => format!("{}: ", location),
        None => String::new(),
    }
}
