//! Configuration management for devboot.
//!
//! Handles loading configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::RetryConfig;
use crate::extension::{InstallTarget, RerunPolicy, StateStore, DEFAULT_REGISTRY_URL};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "DEVBOOT_CONFIG";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extension registry settings
    pub registry: RegistryConfig,

    /// Extension batch settings
    pub extensions: ExtensionsConfig,

    /// Install targets, one per editor family
    pub targets: Vec<InstallTarget>,

    /// Container start-up settings
    pub bootstrap: BootstrapConfig,
}

/// Extension registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry base URL (Open VSX compatible)
    pub url: String,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Verify artifacts against the registry's published SHA-256
    pub verify_checksums: bool,
}

/// Extension batch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    /// Whether the bootstrap runs the extension batch
    pub enabled: bool,

    /// Extension list file (one `publisher.name` per line)
    pub list_file: PathBuf,

    /// Install state file
    pub state_file: PathBuf,

    /// Marker file left by earlier provisioning scripts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_marker: Option<PathBuf>,

    /// What to do when the batch already ran
    pub rerun_policy: RerunPolicy,
}

/// Container start-up settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// User to grant socket access to (defaults to `$USER`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Control-plane socket fixup
    pub socket: SocketConfig,

    /// Tools to discover and configure once
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

/// Control-plane socket fixup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Whether to run the fixup
    pub enabled: bool,

    /// Candidate socket paths, tried in order
    pub candidates: Vec<PathBuf>,

    /// Detection attempts (with backoff)
    pub detect_attempts: u32,

    /// Access verification attempts (fixed delay)
    pub verify_attempts: u32,

    /// Base delay between attempts in milliseconds
    pub delay_ms: u64,
}

/// A tool to discover and configure once per environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Tool name, also used for the `$PATH` lookup
    pub name: String,

    /// Candidate executable paths, tried before `$PATH`
    #[serde(default)]
    pub candidates: Vec<PathBuf>,

    /// Argument lists to run with the discovered executable
    #[serde(default)]
    pub setup: Vec<Vec<String>>,
}

impl ToolConfig {
    /// Create a tool entry with no candidates or setup.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), candidates: Vec::new(), setup: Vec::new() }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `$DEVBOOT_CONFIG`
    /// 2. `~/.config/devboot/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::locate().map(|p| Self::load_from_file(&p)).transpose()?.unwrap_or_default())
    }

    /// Path of the config file `load` would read, if any exists.
    pub fn locate() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            return Some(path);
        }

        Self::config_dir().map(|d| d.join("config.toml")).filter(|p| p.exists())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("devboot"))
    }

    /// Get the data directory path (for install state).
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("devboot"))
    }

    /// Install targets with `~` expanded.
    pub fn resolved_targets(&self) -> Vec<InstallTarget> {
        self.targets
            .iter()
            .map(|t| InstallTarget { path: expand_path(&t.path), ..t.clone() })
            .collect()
    }

    /// State store for the install state and legacy marker.
    pub fn state_store(&self) -> StateStore {
        let store = StateStore::new(expand_path(&self.extensions.state_file));
        match &self.extensions.legacy_marker {
            Some(marker) => store.with_legacy_marker(expand_path(marker)),
            None => store,
        }
    }

    /// Extension list file with `~` expanded.
    pub fn list_file(&self) -> PathBuf {
        expand_path(&self.extensions.list_file)
    }

    /// HTTP timeout for registry calls.
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry.timeout_secs)
    }
}

impl SocketConfig {
    /// Retry settings for socket detection.
    pub fn detect_retry(&self) -> RetryConfig {
        RetryConfig::backoff(self.detect_attempts, Duration::from_millis(self.delay_ms))
    }

    /// Retry settings for access verification.
    pub fn verify_retry(&self) -> RetryConfig {
        RetryConfig::fixed(self.verify_attempts, Duration::from_millis(self.delay_ms))
    }
}

/// Expand a leading `~` in a path.
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
        None => path.to_path_buf(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            extensions: ExtensionsConfig::default(),
            targets: default_targets(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

fn default_targets() -> Vec<InstallTarget> {
    ["vscode", "cursor", "windsurf"]
        .into_iter()
        .map(|editor| InstallTarget {
            name: editor.to_string(),
            path: PathBuf::from(format!("~/.{editor}-server/extensions")),
            only_if_exists: editor != "vscode",
        })
        .collect()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { url: DEFAULT_REGISTRY_URL.to_string(), timeout_secs: 30, verify_checksums: true }
    }
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        let state_file = Config::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share/devboot"))
            .join("install-state.json");

        Self {
            enabled: true,
            list_file: PathBuf::from("/etc/devboot/extensions.txt"),
            state_file,
            legacy_marker: None,
            rerun_policy: RerunPolicy::Skip,
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self { user: None, socket: SocketConfig::default(), tools: Vec::new() }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            candidates: vec![
                PathBuf::from("/var/run/docker.sock"),
                PathBuf::from("/run/docker.sock"),
                PathBuf::from("/var/run/docker-host.sock"),
            ],
            detect_attempts: 3,
            verify_attempts: 3,
            delay_ms: 1000,
        }
    }
}
