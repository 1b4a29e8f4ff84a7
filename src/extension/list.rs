//! Extension list files.
//!
//! One identifier per line. Blank lines and lines starting with `#` are
//! ignored, and a trailing ` # note` after an identifier is stripped.

use std::collections::HashSet;
use std::path::Path;

use super::{ExtensionError, ExtensionId, ExtensionResult};

/// Comment marker for list files.
pub const COMMENT_MARKER: char = '#';

/// A line that could not be parsed as an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLine {
    /// 1-based line number.
    pub line: usize,
    /// Raw content of the line.
    pub content: String,
}

/// Parsed extension list.
#[derive(Debug, Clone, Default)]
pub struct ExtensionList {
    /// Identifiers in file order, without duplicates.
    pub ids: Vec<ExtensionId>,
    /// Lines that were skipped because they are not valid identifiers.
    pub invalid: Vec<InvalidLine>,
}

impl ExtensionList {
    /// Parse list content.
    pub fn parse(content: &str) -> Self {
        let mut list = Self::default();
        let mut seen = HashSet::new();

        for (index, raw) in content.lines().enumerate() {
            let line = match raw.split_once(COMMENT_MARKER) {
                Some((before, _)) => before.trim(),
                None => raw.trim(),
            };

            if line.is_empty() {
                continue;
            }

            match line.parse::<ExtensionId>() {
                Ok(id) => {
                    if seen.insert(id.clone()) {
                        list.ids.push(id);
                    } else {
                        tracing::debug!("Duplicate extension '{}' on line {}", id, index + 1);
                    }
                }
                Err(_) => {
                    tracing::warn!("Skipping invalid extension identifier on line {}: {}", index + 1, line);
                    list.invalid.push(InvalidLine { line: index + 1, content: line.to_string() });
                }
            }
        }

        list
    }

    /// Read and parse a list file.
    pub fn from_file(path: &Path) -> ExtensionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Build a list from identifiers given on the command line.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> ExtensionResult<Self> {
        let mut list = Self::default();
        for arg in args {
            let id: ExtensionId = arg.as_ref().parse()?;
            if !list.ids.contains(&id) {
                list.ids.push(id);
            }
        }
        if list.ids.is_empty() {
            return Err(ExtensionError::InvalidIdentifier(String::new()));
        }
        Ok(list)
    }

    /// Number of identifiers.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the list has no identifiers.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
