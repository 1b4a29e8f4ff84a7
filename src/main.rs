//! Devboot - editor extension provisioning and container bootstrap.
//!
//! Installs editor extensions from an Open VSX compatible registry into
//! every editor's extensions directory, and sequences container start-up.

#![allow(clippy::single_match_else)]

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use devboot::bootstrap::{exec_command, BootstrapReport, Orchestrator};
use devboot::core::{Config, CONFIG_ENV};
use devboot::extension::{
    ArtifactInstaller, BatchInstaller, BatchOptions, ExtensionList, ExtensionStatus, HttpRegistry,
    Registry, RerunPolicy,
};

/// Exit code when the final command cannot be executed.
const EXEC_FAILED_EXIT: i32 = 127;

/// Provision editor extensions and bootstrap development containers
#[derive(Parser)]
#[command(name = "devboot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install extensions into every configured target
    Install {
        /// Extension list file (defaults to the configured list)
        #[arg(short, long)]
        list: Option<PathBuf>,

        /// Extension identifiers (publisher.name); override the list file
        ids: Vec<String>,

        /// Run even if the install state says the batch already ran
        #[arg(short, long)]
        force: bool,

        /// Exit with status 1 when any extension failed
        #[arg(long)]
        strict: bool,

        /// Resolve only; do not download or install
        #[arg(long)]
        dry_run: bool,
    },

    /// Download extension packages without installing them
    Download {
        /// Extension list file (defaults to the configured list)
        #[arg(short, long)]
        list: Option<PathBuf>,

        /// Extension identifiers (publisher.name); override the list file
        ids: Vec<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Run the container start-up sequence, then exec COMMAND
    Bootstrap {
        /// Command to exec once start-up finished
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Show the install state
    Status,

    /// Forget the install state so the next batch runs again
    Reset,

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(false).with_writer(io::stderr))
        .with(filter)
        .init();

    // Handle commands
    match cli.command {
        Commands::Install { list, ids, force, strict, dry_run } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_install(&config, list.as_deref(), &ids, force, strict, dry_run)?;
        }
        Commands::Download { list, ids, out } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_download(&config, list.as_deref(), &ids, &out)?;
        }
        Commands::Bootstrap { command } => {
            // A bad config must not keep the container from starting.
            let report = match load_config(cli.config.as_deref()) {
                Ok(config) => Orchestrator::from_config(&config).run(),
                Err(e) => BootstrapReport::config_failed(format!("{e:#}")),
            };
            cmd_bootstrap(&report, &command);
        }
        Commands::Status => {
            cmd_status(&load_config(cli.config.as_deref())?)?;
        }
        Commands::Reset => {
            cmd_reset(&load_config(cli.config.as_deref())?)?;
        }
        Commands::Config { path } => {
            cmd_config(cli.config.as_deref(), path)?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

/// Load the configuration from `--config` or the default location.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    }
}

/// Identifiers from the command line, or else from the list file.
fn load_list(config: &Config, list: Option<&Path>, ids: &[String]) -> Result<ExtensionList> {
    if !ids.is_empty() {
        return ExtensionList::from_args(ids).context("Invalid extension identifier");
    }

    let path = list.map_or_else(|| config.list_file(), Path::to_path_buf);
    ExtensionList::from_file(&path)
        .with_context(|| format!("Failed to read extension list {}", path.display()))
}

fn registry_for(config: &Config) -> Result<HttpRegistry> {
    HttpRegistry::with_url(&config.registry.url, config.registry_timeout())
        .context("Failed to create registry client")
}

/// Run the guarded extension batch.
fn cmd_install(
    config: &Config,
    list: Option<&Path>,
    ids: &[String],
    force: bool,
    strict: bool,
    dry_run: bool,
) -> Result<()> {
    let list = load_list(config, list, ids)?;
    if list.is_empty() {
        println!("No extensions to install.");
        return Ok(());
    }

    let registry = registry_for(config)?;
    let store = config.state_store();
    let targets = config.resolved_targets();
    let options = BatchOptions {
        policy: if force { RerunPolicy::Always } else { config.extensions.rerun_policy },
        verify_checksums: config.registry.verify_checksums,
        dry_run,
        temp_root: None,
    };

    let report = BatchInstaller::new(&registry, &store, &targets, options).run(&list.ids)?;
    report.log();
    println!("{}", report.summary());

    if strict && report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

/// Download packages into a directory.
fn cmd_download(config: &Config, list: Option<&Path>, ids: &[String], out: &Path) -> Result<()> {
    let list = load_list(config, list, ids)?;
    let registry = registry_for(config)?;
    let installer =
        ArtifactInstaller::new(&registry).verify_checksums(config.registry.verify_checksums);

    let mut failed = 0;
    for id in &list.ids {
        match registry.resolve(id).and_then(|record| installer.download_to(&record, out)) {
            Ok(path) => println!("{}", path.display()),
            Err(e) => {
                tracing::warn!("Failed to download {}: {}", id, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} downloads failed", list.len());
    }

    Ok(())
}

/// Report the start-up steps, then exec the final command.
fn cmd_bootstrap(report: &BootstrapReport, command: &[String]) {
    if command.is_empty() {
        println!("{}", report.render());
        return;
    }

    report.log();
    let err = exec_command(command);
    eprintln!("devboot: failed to exec {}: {err}", command[0]);
    std::process::exit(EXEC_FAILED_EXIT);
}

/// Show the install state.
fn cmd_status(config: &Config) -> Result<()> {
    let store = config.state_store();
    let state = store.load()?;

    println!("State file: {}", store.path().display());

    match state.ran_at {
        Some(secs) => {
            let ran_at = i64::try_from(secs)
                .ok()
                .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
                .map_or_else(|| secs.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());
            println!("Last batch: {ran_at}");
        }
        None => println!("Last batch: never"),
    }

    if !state.extensions.is_empty() {
        println!();
        for (id, entry) in &state.extensions {
            let status = match entry.status {
                ExtensionStatus::Installed => "installed",
                ExtensionStatus::Failed => "failed",
            };
            let version = entry.version.as_deref().unwrap_or("-");
            match &entry.error {
                Some(error) => println!("  {id:<40} {status:<10} {version:<12} {error}"),
                None => println!("  {id:<40} {status:<10} {version}"),
            }
        }
    }

    if !state.tools.is_empty() {
        let tools: Vec<_> = state.tools.keys().map(String::as_str).collect();
        println!();
        println!("Configured tools: {}", tools.join(", "));
    }

    Ok(())
}

/// Delete the install state.
fn cmd_reset(config: &Config) -> Result<()> {
    let store = config.state_store();
    if store.reset()? {
        println!("Removed install state {}", store.path().display());
    } else {
        println!("No install state to remove.");
    }
    Ok(())
}

/// Show configuration.
fn cmd_config(path: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        match path.map(Path::to_path_buf).or_else(Config::locate) {
            Some(path) => println!("{}", path.display()),
            None => {
                if let Some(dir) = Config::config_dir() {
                    println!("{} (not present, using defaults)", dir.join("config.toml").display());
                }
            }
        }
        return Ok(());
    }

    let config = load_config(path)?;
    println!("{}", config.to_toml()?);

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "devboot", &mut io::stdout());
}
