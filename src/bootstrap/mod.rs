//! Container start-up sequence.
//!
//! On every container start the orchestrator runs, in order:
//!
//! 1. control-plane socket permission fixup
//! 2. tool discovery
//! 3. one-time tool configuration
//! 4. the guarded extension batch
//!
//! and then hands the process over to the caller's command. Steps 1-4 are
//! best-effort: a failed step is recorded in the [`BootstrapReport`] and the
//! next step still runs. Only failing to exec the final command is fatal.

mod exec;
mod extensions;
mod provider;
mod socket;
mod tools;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::Config;
use crate::extension::{ExtensionError, HttpRegistry};

pub use exec::exec_command;
pub use extensions::ExtensionsStep;
pub use provider::{first_available, Provider};
pub use socket::{
    grants_access, AccountOps, DockerHostProvider, SocketFixupStep, SocketPathProvider,
    SystemAccounts, UserIdentity, DEFAULT_SOCKET_GROUP,
};
pub use tools::{
    CommandRunner, ExecutablePathProvider, PathLookupProvider, SystemRunner, ToolDiscoveryStep,
    ToolSetupStep,
};

/// Errors a bootstrap step can end with.
#[derive(Debug, Error)]
pub enum StepError {
    /// Configuration could not be loaded.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Nothing matched (socket, tool, list file).
    #[error("{0}")]
    NotFound(String),

    /// Access could not be granted.
    #[error("Permission fixup failed: {0}")]
    Permission(String),

    /// An external command failed.
    #[error("Command '{program}' failed: {reason}")]
    Command { program: String, reason: String },

    /// Extension batch error (state or list I/O).
    #[error(transparent)]
    Extensions(#[from] ExtensionError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one step.
#[derive(Debug)]
pub enum StepOutcome {
    /// Step ran; short description of what it did.
    Completed(String),
    /// Step did not run.
    Skipped(String),
    /// Step failed; the orchestrator moved on.
    Failed(StepError),
}

impl StepOutcome {
    /// Whether the step failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// State shared between steps of one run.
#[derive(Debug, Default)]
pub struct BootstrapContext {
    /// Discovered tool executables by tool name
    pub tools: BTreeMap<String, PathBuf>,

    /// Control-plane socket, when found
    pub socket: Option<PathBuf>,
}

/// One best-effort step of the start-up sequence.
pub trait Step {
    /// Step name used in the report.
    fn name(&self) -> &str;

    /// Run the step.
    fn run(&mut self, ctx: &mut BootstrapContext) -> StepOutcome;
}

/// Aggregated outcomes of a bootstrap run.
#[derive(Debug, Default)]
pub struct BootstrapReport {
    /// `(step name, outcome)` in execution order
    pub steps: Vec<(String, StepOutcome)>,
}

impl BootstrapReport {
    /// Report for a run whose configuration failed to load.
    ///
    /// The configured steps cannot be built, so the only entry is the failed
    /// `config` step. The caller still execs its command.
    pub fn config_failed(reason: impl Into<String>) -> Self {
        Self {
            steps: vec![(
                "config".to_string(),
                StepOutcome::Failed(StepError::Config(reason.into())),
            )],
        }
    }

    /// Whether any step failed.
    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|(_, o)| o.is_failed())
    }

    /// Outcome of a step by name.
    pub fn outcome(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    /// Render the report, one line per step.
    pub fn render(&self) -> String {
        self.steps
            .iter()
            .map(|(name, outcome)| match outcome {
                StepOutcome::Completed(detail) => format!("[ok]      {name}: {detail}"),
                StepOutcome::Skipped(reason) => format!("[skipped] {name}: {reason}"),
                StepOutcome::Failed(err) => format!("[failed]  {name}: {err}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Log the report once, after all steps ran.
    pub fn log(&self) {
        for (name, outcome) in &self.steps {
            match outcome {
                StepOutcome::Completed(detail) => tracing::info!("{}: {}", name, detail),
                StepOutcome::Skipped(reason) => tracing::info!("{}: skipped ({})", name, reason),
                StepOutcome::Failed(err) => tracing::warn!("{}: {}", name, err),
            }
        }
    }
}

/// Runs the start-up steps in order.
#[derive(Default)]
pub struct Orchestrator {
    steps: Vec<Box<dyn Step>>,
}

impl Orchestrator {
    /// Create an orchestrator with no steps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Build the standard sequence from configuration.
    pub fn from_config(config: &Config) -> Self {
        let socket = &config.bootstrap.socket;
        let user = config
            .bootstrap
            .user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "root".to_string());

        let socket_step = if socket.enabled {
            SocketFixupStep::from_config(socket, &user, Box::new(SystemAccounts))
        } else {
            SocketFixupStep::disabled()
        };

        let extensions = match HttpRegistry::with_url(&config.registry.url, config.registry_timeout())
        {
            Ok(registry) => ExtensionsStep::from_config(config, Box::new(registry)),
            Err(e) => ExtensionsStep::unavailable(e),
        };

        Self::new()
            .step(socket_step)
            .step(ToolDiscoveryStep::from_config(&config.bootstrap.tools))
            .step(ToolSetupStep::new(
                config.bootstrap.tools.clone(),
                config.state_store(),
                Box::new(SystemRunner),
            ))
            .step(extensions)
    }

    /// Names of the configured steps, in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step; never stops early.
    pub fn run(&mut self) -> BootstrapReport {
        let mut ctx = BootstrapContext::default();
        let mut report = BootstrapReport::default();

        for step in &mut self.steps {
            tracing::debug!("Running bootstrap step '{}'", step.name());
            let outcome = step.run(&mut ctx);
            report.steps.push((step.name().to_string(), outcome));
        }

        report
    }
}
