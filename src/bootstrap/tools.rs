//! Tool discovery and one-time tool configuration.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::provider::{first_available, Provider};
use super::{BootstrapContext, Step, StepError, StepOutcome};
use crate::core::ToolConfig;
use crate::extension::StateStore;

/// A fixed path that must be an executable file.
#[derive(Debug, Clone)]
pub struct ExecutablePathProvider {
    path: PathBuf,
}

impl ExecutablePathProvider {
    /// Create a provider for one path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Provider for ExecutablePathProvider {
    type Output = PathBuf;

    fn describe(&self) -> String {
        format!("executable {}", self.path.display())
    }

    fn provide(&self) -> Option<PathBuf> {
        let metadata = std::fs::metadata(&self.path).ok()?;
        (metadata.is_file() && metadata.permissions().mode() & 0o111 != 0).then(|| self.path.clone())
    }
}

/// `$PATH` lookup by executable name.
#[derive(Debug, Clone)]
pub struct PathLookupProvider {
    name: String,
}

impl PathLookupProvider {
    /// Create a provider looking up `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Provider for PathLookupProvider {
    type Output = PathBuf;

    fn describe(&self) -> String {
        format!("{} on $PATH", self.name)
    }

    fn provide(&self) -> Option<PathBuf> {
        which::which(&self.name).ok()
    }
}

fn providers_for(tool: &ToolConfig) -> Vec<Box<dyn Provider<Output = PathBuf>>> {
    let mut providers: Vec<Box<dyn Provider<Output = PathBuf>>> = tool
        .candidates
        .iter()
        .map(|p| Box::new(ExecutablePathProvider::new(p)) as Box<dyn Provider<Output = PathBuf>>)
        .collect();
    providers.push(Box::new(PathLookupProvider::new(&tool.name)));
    providers
}

/// Bootstrap step that locates configured tools.
pub struct ToolDiscoveryStep {
    tools: Vec<(String, Vec<Box<dyn Provider<Output = PathBuf>>>)>,
}

impl ToolDiscoveryStep {
    /// Create a step from `(tool name, provider chain)` pairs.
    pub fn new(tools: Vec<(String, Vec<Box<dyn Provider<Output = PathBuf>>>)>) -> Self {
        Self { tools }
    }

    /// Candidate paths first, then `$PATH`, for every configured tool.
    pub fn from_config(tools: &[ToolConfig]) -> Self {
        Self::new(tools.iter().map(|t| (t.name.clone(), providers_for(t))).collect())
    }
}

impl Step for ToolDiscoveryStep {
    fn name(&self) -> &str {
        "tools"
    }

    fn run(&mut self, ctx: &mut BootstrapContext) -> StepOutcome {
        if self.tools.is_empty() {
            return StepOutcome::Skipped("no tools configured".to_string());
        }

        let mut missing = Vec::new();
        for (name, providers) in &self.tools {
            match first_available(providers) {
                Some(path) => {
                    tracing::debug!("Found {} at {}", name, path.display());
                    ctx.tools.insert(name.clone(), path);
                }
                None => missing.push(name.as_str()),
            }
        }

        if missing.is_empty() {
            let found: Vec<_> = ctx.tools.keys().map(String::as_str).collect();
            StepOutcome::Completed(format!("found {}", found.join(", ")))
        } else {
            StepOutcome::Failed(StepError::NotFound(format!("missing tools: {}", missing.join(", "))))
        }
    }
}

/// Runs an external program to completion.
pub trait CommandRunner {
    /// Run `program` with `args`; an unsuccessful exit is an error.
    fn run(&self, program: &Path, args: &[String]) -> Result<(), StepError>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<(), StepError> {
        let command_error = |reason: String| StepError::Command {
            program: program.display().to_string(),
            reason,
        };

        let output = Command::new(program).args(args).output().map_err(|e| command_error(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(command_error(format!("{}: {}", output.status, stderr.trim())))
        }
    }
}

/// Bootstrap step that runs each discovered tool's setup commands once per
/// environment.
pub struct ToolSetupStep {
    tools: Vec<ToolConfig>,
    store: StateStore,
    runner: Box<dyn CommandRunner>,
}

impl ToolSetupStep {
    /// Create the step.
    pub fn new(tools: Vec<ToolConfig>, store: StateStore, runner: Box<dyn CommandRunner>) -> Self {
        Self { tools, store, runner }
    }

    fn setup_tool(&self, tool: &ToolConfig, program: &Path) -> Result<(), StepError> {
        for args in &tool.setup {
            tracing::debug!("Running {} {}", program.display(), args.join(" "));
            self.runner.run(program, args)?;
        }
        Ok(())
    }
}

impl Step for ToolSetupStep {
    fn name(&self) -> &str {
        "tool-setup"
    }

    fn run(&mut self, ctx: &mut BootstrapContext) -> StepOutcome {
        let pending: Vec<&ToolConfig> = self.tools.iter().filter(|t| !t.setup.is_empty()).collect();
        if pending.is_empty() {
            return StepOutcome::Skipped("nothing to configure".to_string());
        }

        let mut state = match self.store.load() {
            Ok(state) => state,
            Err(e) => return StepOutcome::Failed(e.into()),
        };

        let mut configured = Vec::new();
        let mut first_error = None;
        for tool in pending {
            if state.tool_configured(&tool.name) {
                continue;
            }
            let Some(program) = ctx.tools.get(&tool.name) else {
                tracing::debug!("Skipping setup of {}: not discovered", tool.name);
                continue;
            };

            match self.setup_tool(tool, program) {
                Ok(()) => {
                    state.record_tool(&tool.name);
                    configured.push(tool.name.as_str());
                }
                Err(e) => {
                    tracing::warn!("Setup of {} failed: {}", tool.name, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if !configured.is_empty() {
            if let Err(e) = self.store.save(&state) {
                return StepOutcome::Failed(e.into());
            }
        }

        match first_error {
            Some(e) => StepOutcome::Failed(e),
            None if configured.is_empty() => StepOutcome::Skipped("already configured".to_string()),
            None => StepOutcome::Completed(format!("configured {}", configured.join(", "))),
        }
    }
}
