//! # Devboot
//!
//! Provision editor extensions and bootstrap development containers.
//!
//! Devboot resolves editor extensions against an Open VSX compatible
//! registry, downloads each package once, and installs it into every
//! configured editor extensions directory. On container start it also fixes
//! up access to the control-plane socket, configures tools once, runs the
//! extension batch, and then execs the container's command.
//!
//! ## Quick Start
//!
//! ```bash
//! # Install the extensions listed in /etc/devboot/extensions.txt
//! devboot install
//!
//! # Container entrypoint
//! devboot bootstrap -- sleep infinity
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unnecessary_debug_formatting)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

pub mod bootstrap;
pub mod core;
pub mod extension;

pub use bootstrap::{BootstrapReport, Orchestrator, StepError, StepOutcome};
pub use core::Config;
pub use extension::{
    BatchInstaller, BatchOptions, BatchReport, ExtensionError, ExtensionId, ExtensionList,
    HttpRegistry, InstallTarget, Registry, RerunPolicy, StateStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "devboot";
