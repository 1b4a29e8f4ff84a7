//! Guarded batch install.
//!
//! Runs the extension list through the idempotency guard, resolves each
//! remaining identifier, installs it into every target, and persists the
//! per-extension results. Individual failures never abort the batch.

use std::path::PathBuf;

use super::state::{plan, GuardDecision, InstallState, RerunPolicy, StateStore};
use super::{
    ArtifactInstaller, ExtensionError, ExtensionId, ExtensionResult, InstallOutcome, InstallTarget,
    Registry,
};

/// Result for one extension in a batch.
#[derive(Debug)]
pub enum ExtensionReport {
    /// Installed into every present target.
    Installed(InstallOutcome),
    /// Resolved but not installed (dry run).
    Planned { id: ExtensionId, version: String },
    /// Lookup, transfer, or target failure.
    Failed { id: ExtensionId, error: ExtensionError },
}

impl ExtensionReport {
    /// Whether this extension failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Summary of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Whether the guard skipped the batch.
    pub skipped: bool,

    /// Identifiers not attempted because they are already installed.
    pub up_to_date: Vec<ExtensionId>,

    /// One entry per attempted identifier, in list order.
    pub results: Vec<ExtensionReport>,
}

impl BatchReport {
    /// Number of extensions installed in this run.
    pub fn installed(&self) -> usize {
        self.results.iter().filter(|r| matches!(r, ExtensionReport::Installed(_))).count()
    }

    /// Failures of this run.
    pub fn failures(&self) -> Vec<&ExtensionError> {
        self.failed().into_iter().map(|(_, error)| error).collect()
    }

    /// Failed identifiers with their errors, in list order.
    pub fn failed(&self) -> Vec<(&ExtensionId, &ExtensionError)> {
        self.results
            .iter()
            .filter_map(|r| match r {
                ExtensionReport::Failed { id, error } => Some((id, error)),
                _ => None,
            })
            .collect()
    }

    /// Whether any extension failed.
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(ExtensionReport::is_failed)
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        if self.skipped {
            return "extensions already installed, batch skipped".to_string();
        }
        format!(
            "{} installed, {} failed, {} already up to date",
            self.installed(),
            self.failures().len(),
            self.up_to_date.len()
        )
    }

    /// Log the report once, at the end of a run.
    pub fn log(&self) {
        tracing::info!("Extension batch: {}", self.summary());
        for (id, error) in self.failed() {
            tracing::warn!("  {}: {} ({})", id, error, error.kind());
        }
    }
}

/// Options for a batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Behavior when the state says the batch already ran
    pub policy: RerunPolicy,

    /// Verify artifact checksums
    pub verify_checksums: bool,

    /// Resolve only; do not download, install, or persist
    pub dry_run: bool,

    /// Parent for scoped temp directories
    pub temp_root: Option<PathBuf>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            policy: RerunPolicy::default(),
            verify_checksums: true,
            dry_run: false,
            temp_root: None,
        }
    }
}

/// Runs the guarded extension batch.
pub struct BatchInstaller<'a, R: Registry + ?Sized> {
    registry: &'a R,
    store: &'a StateStore,
    targets: &'a [InstallTarget],
    options: BatchOptions,
}

impl<'a, R: Registry + ?Sized> BatchInstaller<'a, R> {
    /// Create a batch installer.
    pub fn new(
        registry: &'a R,
        store: &'a StateStore,
        targets: &'a [InstallTarget],
        options: BatchOptions,
    ) -> Self {
        Self { registry, store, targets, options }
    }

    /// Run the batch for `ids`.
    ///
    /// Only state I/O errors are returned; per-extension failures are in the
    /// report and in the persisted state.
    pub fn run(&self, ids: &[ExtensionId]) -> ExtensionResult<BatchReport> {
        let mut state = self.store.load()?;

        let to_run = match plan(&state, self.options.policy, ids) {
            GuardDecision::AlreadyInstalled => {
                tracing::info!(
                    "Extensions already installed (state: {}), skipping batch",
                    self.store.path().display()
                );
                return Ok(BatchReport { skipped: true, ..Default::default() });
            }
            GuardDecision::Run(to_run) => to_run,
        };

        let up_to_date: Vec<_> = ids.iter().filter(|id| !to_run.contains(id)).cloned().collect();
        let mut report = BatchReport { skipped: false, up_to_date, results: Vec::new() };

        if self.targets.is_empty() {
            tracing::warn!("No install targets configured");
        }

        let mut installer =
            ArtifactInstaller::new(self.registry).verify_checksums(self.options.verify_checksums);
        if let Some(root) = &self.options.temp_root {
            installer = installer.temp_root(root);
        }

        for id in &to_run {
            let result = self.install_one(&installer, id, &mut state);
            if let ExtensionReport::Failed { error, .. } = &result {
                tracing::warn!("Failed to install {}: {}", id, error);
            }
            report.results.push(result);
        }

        if !self.options.dry_run {
            state.mark_ran();
            self.store.save(&state)?;
        }

        Ok(report)
    }

    fn install_one(
        &self,
        installer: &ArtifactInstaller<'_, R>,
        id: &ExtensionId,
        state: &mut InstallState,
    ) -> ExtensionReport {
        let record = match self.registry.resolve(id) {
            Ok(record) => record,
            Err(e) => {
                state.record_failed(id, None, &e.to_string());
                return ExtensionReport::Failed { id: id.clone(), error: e };
            }
        };

        if self.options.dry_run {
            tracing::info!("[dry run] would install {} {}", id, record.version);
            return ExtensionReport::Planned { id: id.clone(), version: record.version };
        }

        tracing::info!("Installing {} {}", id, record.version);

        match installer.install(&record, self.targets).and_then(InstallOutcome::into_result) {
            Ok(outcome) => {
                state.record_installed(id, &record.version);
                ExtensionReport::Installed(outcome)
            }
            Err(e) => {
                state.record_failed(id, Some(&record.version), &e.to_string());
                ExtensionReport::Failed { id: id.clone(), error: e }
            }
        }
    }
}
