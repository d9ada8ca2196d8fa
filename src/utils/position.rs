//! Source location tracking

use std::fmt;
use std::sync::Arc;

/// A point in a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub col: usize,
    /// Name of the source the position belongs to
    pub filename: Arc<str>,
}

impl Position {
    /// Position of the first character of `filename`
    pub fn start(filename: impl Into<Arc<str>>) -> Self {
        Self {
            line: 1,
            col: 1,
            filename: filename.into(),
        }
    }

    /// Create a dummy position (for testing)
    pub fn dummy() -> Self {
        Self::start("<dummy>")
    }

    /// Step over one consumed character
    pub fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::dummy()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.col)
    }
}
