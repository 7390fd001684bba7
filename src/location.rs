//! Source locations for declarations and open elements.

use std::fmt;

/// A position in the document entity, represented as line and column.
///
/// Both `line` and `column` are 0-indexed. The engine never interprets a
/// location; it only carries the one supplied by the tokenizer so diagnostics
/// can point back at a start tag or declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Create a new location.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The start of the document entity.
    pub fn zero() -> Self {
        Self { line: 0, column: 0 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}
