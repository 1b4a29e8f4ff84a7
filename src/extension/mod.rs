//! Editor extension provisioning.
//!
//! Extensions are resolved against an Open VSX compatible registry,
//! downloaded once, and copied into every configured install target
//! (one extensions directory per editor family).
//!
//! # Layout
//!
//! ```text
//! {target}/{publisher}.{name}-{version}/package.json
//! ```
//!
//! A persisted [`InstallState`] guards the batch so it runs once per
//! environment; [`RerunPolicy`] controls what later runs do.

mod batch;
mod error;
mod identifier;
mod installer;
mod list;
mod registry;
mod state;

pub use batch::{BatchInstaller, BatchOptions, BatchReport, ExtensionReport};
pub use error::{ExtensionError, ExtensionResult};
pub use identifier::{ExtensionId, ID_SEPARATOR};
pub use installer::{
    copy_tree, sha256_file, ArtifactInstaller, InstallOutcome, InstallTarget, TargetOutcome,
    TargetStatus, PAYLOAD_DIR,
};
pub use list::{ExtensionList, InvalidLine, COMMENT_MARKER};
pub use registry::{
    parse_metadata, ExtensionRecord, HttpRegistry, Registry, DEFAULT_REGISTRY_URL,
    DEFAULT_TIMEOUT_SECS,
};
pub use state::{
    now_secs, plan, ExtensionEntry, ExtensionStatus, GuardDecision, InstallState, RerunPolicy,
    StateStore,
};

#[cfg(test)]
pub(crate) use installer::tests as test_support;
