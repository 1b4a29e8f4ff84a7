//! Extension identifiers (`publisher.name`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ExtensionError;

/// Separator between publisher and name.
pub const ID_SEPARATOR: char = '.';

/// A validated `publisher.name` identifier.
///
/// The identifier is split on the first separator, so `a.b.c` has publisher
/// `a` and name `b.c`. Both segments are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionId {
    publisher: String,
    name: String,
}

impl ExtensionId {
    /// Build an identifier from its two segments.
    pub fn new(publisher: impl Into<String>, name: impl Into<String>) -> Result<Self, ExtensionError> {
        let publisher = publisher.into();
        let name = name.into();

        if publisher.is_empty() || name.is_empty() || publisher.contains(ID_SEPARATOR) {
            return Err(ExtensionError::InvalidIdentifier(format!("{publisher}{ID_SEPARATOR}{name}")));
        }

        Ok(Self { publisher, name })
    }

    /// Publisher segment.
    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Name segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory name for an installed version: `publisher.name-version`.
    pub fn versioned_dir_name(&self, version: &str) -> String {
        format!("{self}-{version}")
    }
}

impl FromStr for ExtensionId {
    type Err = ExtensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (publisher, name) = trimmed
            .split_once(ID_SEPARATOR)
            .ok_or_else(|| ExtensionError::InvalidIdentifier(trimmed.to_string()))?;

        if publisher.is_empty() || name.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(ExtensionError::InvalidIdentifier(trimmed.to_string()));
        }

        Ok(Self { publisher: publisher.to_string(), name: name.to_string() })
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.publisher, ID_SEPARATOR, self.name)
    }
}

impl Serialize for ExtensionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExtensionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
