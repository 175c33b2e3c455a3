//! Error types shared by the parser and the license graph.

use std::fmt;

use thiserror::Error;

/// A license expression that does not conform to the SPDX expression grammar.
///
/// `offset` is a byte offset into `text`. The `Display` impl renders the input
/// with a caret under the offending position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParseError {
    pub text: String,
    pub offset: usize,
    pub detail: String,
}

impl ParseError {
    pub(crate) fn new(text: &str, offset: usize, detail: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            offset: offset.min(text.len()),
            detail: detail.into(),
        }
    }

    /// Column of the caret, counted in characters rather than bytes.
    fn column(&self) -> usize {
        self.text
            .get(..self.offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(self.offset)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "invalid license expression: {} (at byte {})",
            self.detail, self.offset
        )?;
        writeln!(f, "  {}", self.text)?;
        write!(f, "  {}^", " ".repeat(self.column()))
    }
}

/// Structural defects found while loading the license tables.
///
/// Loading never stops at the first problem: every defect found in the
/// registry, the rule list and the user overrides ends up in `errors`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct LicenseDataError {
    pub errors: Vec<String>,
}

impl fmt::Display for LicenseDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid license data ({} problem", self.errors.len())?;
        if self.errors.len() != 1 {
            write!(f, "s")?;
        }
        write!(f, ")")?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}
