use std::fmt;

/// Represents a position within source code (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// How much of a location is rendered in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationDetail {
    /// Only the line number (`12`).
    Line,
    /// Both line and column (`12:5`).
    LineAndColumn,
}

impl Location {
    /// Construct a location given its line and column.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Render this location with the requested granularity.
    pub fn describe(self, detail: LocationDetail) -> String {
        match detail {
            LocationDetail::Line => format!("line {}", self.line),
            LocationDetail::LineAndColumn => format!("line {}:{}", self.line, self.column),
        }
    }

    /// Offset this location by another one, as if `self` was relative to `origin`.
    ///
    /// Used when source code embedded in a string literal is parsed on its own.
    pub fn relative_to(self, origin: Location) -> Self {
        if self.line <= 1 {
            Self::new(origin.line, origin.column + self.column)
        } else {
            Self::new(origin.line + self.line - 1, self.column)
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
