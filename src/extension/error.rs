//! Extension provisioning error types.

use std::path::PathBuf;
use thiserror::Error;

use super::ExtensionId;

/// Result type for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Errors that can occur while resolving or installing extensions.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// Identifier is not of the form `publisher.name`.
    #[error("Invalid extension identifier '{0}': expected 'publisher.name'")]
    InvalidIdentifier(String),

    /// Registry lookup failed or the extension is unknown.
    #[error("Extension '{id}' not found: {reason}")]
    NotFound { id: ExtensionId, reason: String },

    /// Artifact could not be downloaded, verified, or extracted.
    #[error("Transfer failed for '{id}': {reason}")]
    TransferFailed { id: ExtensionId, reason: String },

    /// None of the install targets exist on this machine.
    #[error("No install target present for '{id}'")]
    NoTargets { id: ExtensionId },

    /// Installed into some targets but not all of them.
    #[error("Extension '{id}' installed partially, failed targets: {}", display_paths(.failed))]
    PartialInstall { id: ExtensionId, failed: Vec<PathBuf> },

    /// Install state could not be read or written.
    #[error("Install state error: {0}")]
    State(String),

    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtensionError {
    /// Identifier the error refers to, if any.
    pub fn extension_id(&self) -> Option<&ExtensionId> {
        match self {
            Self::NotFound { id, .. }
            | Self::TransferFailed { id, .. }
            | Self::NoTargets { id }
            | Self::PartialInstall { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Short category label used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid-identifier",
            Self::NotFound { .. } => "not-found",
            Self::TransferFailed { .. } => "transfer-failed",
            Self::NoTargets { .. } => "no-targets",
            Self::PartialInstall { .. } => "partial-install",
            Self::State(_) => "state",
            Self::Http(_) => "http",
            Self::Io(_) => "io",
        }
    }

    pub(crate) fn not_found(id: &ExtensionId, reason: impl Into<String>) -> Self {
        Self::NotFound { id: id.clone(), reason: reason.into() }
    }

    pub(crate) fn transfer(id: &ExtensionId, reason: impl Into<String>) -> Self {
        Self::TransferFailed { id: id.clone(), reason: reason.into() }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}
