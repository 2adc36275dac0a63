//! source positions
//!
//! Positions exist for diagnostics only. Nothing in the tree model or the matching engine
//! makes decisions based on them.
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Location of a node in its source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    file: Option<Arc<str>>,
    line: Option<usize>,
}

impl Position {
    pub fn new(file: Option<Arc<str>>, line: usize) -> Self {
        Self {
            file,
            line: Some(line),
        }
    }

    /// Position of nodes that were not loaded from a file (e.g. built in code)
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn is_known(&self) -> bool {
        self.line.is_some()
    }
}

/// Compact `file:line` form, `?` for missing parts
impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (None, None) => f.write_str("?"),
            (Some(file), None) => write!(f, "{file}:?"),
            (None, Some(line)) => write!(f, "?:{line}"),
            (Some(file), Some(line)) => write!(f, "{file}:{line}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compact_form() {
        assert_eq!(Position::unknown().to_string(), "?");
        assert_eq!(Position::new(None, 3).to_string(), "?:3");
        assert_eq!(Position::new(Some("base.yml".into()), 12).to_string(), "base.yml:12");
    }
}
