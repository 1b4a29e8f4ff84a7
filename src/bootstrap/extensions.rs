//! Extension batch as a bootstrap step.

use std::path::PathBuf;

use super::{BootstrapContext, Step, StepError, StepOutcome};
use crate::core::Config;
use crate::extension::{
    BatchInstaller, BatchOptions, ExtensionError, ExtensionList, InstallTarget, Registry,
    StateStore,
};

/// Bootstrap step running the guarded extension batch from the list file.
pub struct ExtensionsStep {
    enabled: bool,
    registry: Result<Box<dyn Registry>, Option<ExtensionError>>,
    list_file: PathBuf,
    targets: Vec<InstallTarget>,
    store: StateStore,
    options: BatchOptions,
}

impl ExtensionsStep {
    /// Build the step from configuration.
    pub fn from_config(config: &Config, registry: Box<dyn Registry>) -> Self {
        Self {
            enabled: config.extensions.enabled,
            registry: Ok(registry),
            list_file: config.list_file(),
            targets: config.resolved_targets(),
            store: config.state_store(),
            options: BatchOptions {
                policy: config.extensions.rerun_policy,
                verify_checksums: config.registry.verify_checksums,
                ..Default::default()
            },
        }
    }

    /// A step that fails with `error`, used when no registry client could be built.
    pub fn unavailable(error: ExtensionError) -> Self {
        Self {
            enabled: true,
            registry: Err(Some(error)),
            list_file: PathBuf::new(),
            targets: Vec::new(),
            store: StateStore::new(PathBuf::new()),
            options: BatchOptions::default(),
        }
    }
}

impl Step for ExtensionsStep {
    fn name(&self) -> &str {
        "extensions"
    }

    fn run(&mut self, _ctx: &mut BootstrapContext) -> StepOutcome {
        if !self.enabled {
            return StepOutcome::Skipped("disabled".to_string());
        }

        let registry = match &mut self.registry {
            Ok(registry) => &**registry,
            Err(error) => {
                return match error.take() {
                    Some(e) => StepOutcome::Failed(e.into()),
                    None => StepOutcome::Skipped("registry unavailable".to_string()),
                };
            }
        };

        if !self.list_file.exists() {
            return StepOutcome::Skipped(format!("no extension list at {}", self.list_file.display()));
        }

        let list = match ExtensionList::from_file(&self.list_file) {
            Ok(list) => list,
            Err(e) => return StepOutcome::Failed(e.into()),
        };
        if list.is_empty() {
            return StepOutcome::Skipped("extension list is empty".to_string());
        }

        let batch = BatchInstaller::new(registry, &self.store, &self.targets, self.options.clone());
        match batch.run(&list.ids) {
            Ok(report) => {
                report.log();
                StepOutcome::Completed(report.summary())
            }
            Err(e) => StepOutcome::Failed(StepError::from(e)),
        }
    }
}
