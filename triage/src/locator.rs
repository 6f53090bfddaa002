//! Position extraction from `path:line:col[-col]:` locators

use crate::error::{TriageError, TriageResult};
use regex::Regex;
use std::sync::LazyLock;

/// `:LINE:COL:` with an optional `-COL` range tail (repeated tails keep the last)
static LOCATOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([0-9]+):([0-9]+)((?:-[0-9]+)*):").unwrap());

/// Position of an error inside its source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    /// Line number (1-indexed)
    pub line: usize,
    /// Starting column
    pub col_start: usize,
    /// Ending column, equal to `col_start` when no range is given
    pub col_end: usize,
}

impl Locator {
    /// Extract the first locator found in `text`
    pub fn extract(text: &str) -> TriageResult<Self> {
        Self::find(text).ok_or_else(|| TriageError::MalformedLocator {
            line: text.trim_end().to_string(),
        })
    }

    /// Like [`Locator::extract`] but without treating absence as an error.
    ///
    /// Oracle messages without a position are expected and simply ignored.
    pub fn find(text: &str) -> Option<Self> {
        let caps = LOCATOR_PATTERN.captures(text)?;
        let line = caps[1].parse().ok()?;
        let col_start = caps[2].parse().ok()?;
        let col_end = match caps[3].rsplit('-').next() {
            Some(last) if !last.is_empty() => last.parse().ok()?,
            _ => col_start,
        };
        Some(Self {
            line,
            col_start,
            col_end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_column() {
        let loc = Locator::extract("foo.sv:10:5: syntax error at token \"x\"").unwrap();
        assert_eq!(
            loc,
            Locator {
                line: 10,
                col_start: 5,
                col_end: 5
            }
        );
    }

    #[test]
    fn test_column_range() {
        let loc = Locator::extract("dir/foo.sv:7:3-11: syntax error").unwrap();
        assert_eq!(loc.line, 7);
        assert_eq!(loc.col_start, 3);
        assert_eq!(loc.col_end, 11);
    }

    #[test]
    fn test_repeated_range_keeps_last() {
        let loc = Locator::extract("foo.sv:2:1-4-9: oops").unwrap();
        assert_eq!(loc.col_start, 1);
        assert_eq!(loc.col_end, 9);
    }

    #[test]
    fn test_first_locator_wins() {
        let loc = Locator::extract("a.sv:3:4: see also b.sv:9:9:").unwrap();
        assert_eq!(loc.line, 3);
        assert_eq!(loc.col_start, 4);
    }

    #[test]
    fn test_missing_locator_is_error() {
        assert!(Locator::extract("foo.sv: syntax error").is_err());
        assert!(Locator::extract("foo.sv:10: syntax error").is_err());
        assert!(Locator::find("").is_none());
    }
}
