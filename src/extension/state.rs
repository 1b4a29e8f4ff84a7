//! Persisted install state and the idempotency guard.
//!
//! The state file records when the extension batch last ran and what became
//! of each extension. A state with `ran_at` set means "the batch for this
//! environment already ran"; what a new run does about it is decided by the
//! [`RerunPolicy`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{ExtensionError, ExtensionId, ExtensionResult};

/// What a batch run does when the state says it already ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RerunPolicy {
    /// Skip the whole batch.
    #[default]
    Skip,
    /// Re-attempt only extensions that are missing or recorded as failed.
    RetryFailed,
    /// Run every extension again.
    Always,
}

impl std::fmt::Display for RerunPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Skip => "skip",
            Self::RetryFailed => "retry-failed",
            Self::Always => "always",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for RerunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "retry-failed" | "retry_failed" | "retry" => Ok(Self::RetryFailed),
            "always" => Ok(Self::Always),
            other => Err(format!("unknown rerun policy '{other}'")),
        }
    }
}

/// Status of one extension after its last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionStatus {
    /// Installed into every (present) target.
    Installed,
    /// Lookup, transfer, or at least one target failed.
    Failed,
}

/// Recorded result for one extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionEntry {
    /// Last status
    pub status: ExtensionStatus,

    /// Installed version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Last error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When this entry was last written (unix seconds)
    pub updated_at: u64,
}

/// Persisted state for the extension batch and one-time tool setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallState {
    /// When the batch last completed (unix seconds)
    #[serde(default)]
    pub ran_at: Option<u64>,

    /// Per-extension results
    #[serde(default)]
    pub extensions: BTreeMap<String, ExtensionEntry>,

    /// Tools whose one-time setup has run, with the time it ran
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, u64>,
}

/// Current unix time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

impl InstallState {
    /// Whether the batch has already run.
    pub fn has_run(&self) -> bool {
        self.ran_at.is_some()
    }

    /// Recorded entry for an extension.
    pub fn entry(&self, id: &ExtensionId) -> Option<&ExtensionEntry> {
        self.extensions.get(&id.to_string())
    }

    /// Record a successful install.
    pub fn record_installed(&mut self, id: &ExtensionId, version: &str) {
        self.extensions.insert(
            id.to_string(),
            ExtensionEntry {
                status: ExtensionStatus::Installed,
                version: Some(version.to_string()),
                error: None,
                updated_at: now_secs(),
            },
        );
    }

    /// Record a failed attempt. A version is kept when the lookup succeeded.
    pub fn record_failed(&mut self, id: &ExtensionId, version: Option<&str>, error: &str) {
        self.extensions.insert(
            id.to_string(),
            ExtensionEntry {
                status: ExtensionStatus::Failed,
                version: version.map(str::to_string),
                error: Some(error.to_string()),
                updated_at: now_secs(),
            },
        );
    }

    /// Mark the batch as completed now.
    pub fn mark_ran(&mut self) {
        self.ran_at = Some(now_secs());
    }

    /// Identifiers recorded as failed.
    pub fn failed(&self) -> Vec<&str> {
        self.extensions
            .iter()
            .filter(|(_, e)| e.status == ExtensionStatus::Failed)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Whether a tool's one-time setup has run.
    pub fn tool_configured(&self, tool: &str) -> bool {
        self.tools.contains_key(tool)
    }

    /// Record that a tool's one-time setup ran.
    pub fn record_tool(&mut self, tool: &str) {
        self.tools.insert(tool.to_string(), now_secs());
    }
}

/// Decision of the idempotency guard for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The batch already ran; nothing to do.
    AlreadyInstalled,
    /// Run these identifiers (possibly empty when all are installed).
    Run(Vec<ExtensionId>),
}

/// Decide which identifiers a run should attempt.
pub fn plan(state: &InstallState, policy: RerunPolicy, ids: &[ExtensionId]) -> GuardDecision {
    if !state.has_run() {
        return GuardDecision::Run(ids.to_vec());
    }

    match policy {
        RerunPolicy::Skip => GuardDecision::AlreadyInstalled,
        RerunPolicy::Always => GuardDecision::Run(ids.to_vec()),
        RerunPolicy::RetryFailed => GuardDecision::Run(
            ids.iter()
                .filter(|id| {
                    !matches!(state.entry(id), Some(e) if e.status == ExtensionStatus::Installed)
                })
                .cloned()
                .collect(),
        ),
    }
}

/// Loads and saves [`InstallState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    /// JSON state file
    path: PathBuf,

    /// Zero-byte marker left by earlier provisioning scripts
    legacy_marker: Option<PathBuf>,
}

impl StateStore {
    /// Create a store for the given state file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), legacy_marker: None }
    }

    /// Also honor a legacy marker file when no state file exists.
    #[must_use]
    pub fn with_legacy_marker(mut self, marker: impl Into<PathBuf>) -> Self {
        self.legacy_marker = Some(marker.into());
        self
    }

    /// State file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Legacy marker path.
    pub fn legacy_marker(&self) -> Option<&Path> {
        self.legacy_marker.as_deref()
    }

    /// Load the state. A missing file yields the empty state.
    pub fn load(&self) -> ExtensionResult<InstallState> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            return serde_json::from_str(&content).map_err(|e| {
                ExtensionError::State(format!("{}: {}", self.path.display(), e))
            });
        }

        if let Some(marker) = self.legacy_marker.as_deref().filter(|m| m.exists()) {
            tracing::debug!("Using legacy marker {}", marker.display());
            let ran_at = std::fs::metadata(marker)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or_else(now_secs, |d| d.as_secs());
            return Ok(InstallState { ran_at: Some(ran_at), ..Default::default() });
        }

        Ok(InstallState::default())
    }

    /// Save the state, replacing the file atomically.
    pub fn save(&self, state: &InstallState) -> ExtensionResult<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| ExtensionError::State(e.to_string()))?;

        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        std::io::Write::write_all(&mut staged, content.as_bytes())?;
        staged.persist(&self.path).map_err(|e| ExtensionError::Io(e.error))?;

        Ok(())
    }

    /// Delete the state file and the legacy marker.
    ///
    /// Returns whether anything was removed.
    pub fn reset(&self) -> ExtensionResult<bool> {
        let mut removed = false;
        for path in std::iter::once(self.path.as_path()).chain(self.legacy_marker.as_deref()) {
            if path.exists() {
                std::fs::remove_file(path)?;
                removed = true;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(raw: &[&str]) -> Vec<ExtensionId> {
        raw.iter().map(|r| r.parse().unwrap()).collect()
    }

    #[test]
    fn test_fresh_state_runs_everything() {
        let state = InstallState::default();
        let wanted = ids(&["a.one", "b.two"]);

        for policy in [RerunPolicy::Skip, RerunPolicy::RetryFailed, RerunPolicy::Always] {
            assert_eq!(plan(&state, policy, &wanted), GuardDecision::Run(wanted.clone()));
        }
    }

    #[test]
    fn test_skip_policy_skips_whole_batch() {
        let mut state = InstallState::default();
        state.mark_ran();

        let decision = plan(&state, RerunPolicy::Skip, &ids(&["a.one"]));
        assert_eq!(decision, GuardDecision::AlreadyInstalled);
    }

    #[test]
    fn test_retry_failed_policy() {
        let wanted = ids(&["a.one", "b.two", "c.three"]);
        let mut state = InstallState::default();
        state.record_installed(&wanted[0], "1.0.0");
        state.record_failed(&wanted[1], None, "not found");
        state.mark_ran();

        // c.three was never attempted, b.two failed
        let decision = plan(&state, RerunPolicy::RetryFailed, &wanted);
        assert_eq!(decision, GuardDecision::Run(wanted[1..].to_vec()));
    }

    #[test]
    fn test_always_policy() {
        let wanted = ids(&["a.one"]);
        let mut state = InstallState::default();
        state.record_installed(&wanted[0], "1.0.0");
        state.mark_ran();

        assert_eq!(plan(&state, RerunPolicy::Always, &wanted), GuardDecision::Run(wanted));
    }

    #[test]
    fn test_policy_parse_and_display() {
        assert_eq!("skip".parse::<RerunPolicy>().unwrap(), RerunPolicy::Skip);
        assert_eq!("retry-failed".parse::<RerunPolicy>().unwrap(), RerunPolicy::RetryFailed);
        assert_eq!("Always".parse::<RerunPolicy>().unwrap(), RerunPolicy::Always);
        assert!("sometimes".parse::<RerunPolicy>().is_err());
        assert_eq!(RerunPolicy::RetryFailed.to_string(), "retry-failed");
    }

    #[test]
    fn test_store_roundtrip_and_reset() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("nested/state.json"));

        assert_eq!(store.load().unwrap(), InstallState::default());

        let id: ExtensionId = "foo.bar".parse().unwrap();
        let mut state = InstallState::default();
        state.record_installed(&id, "1.2.3");
        state.record_tool("git");
        state.mark_ran();
        store.save(&state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.entry(&id).unwrap().version.as_deref(), Some("1.2.3"));
        assert!(loaded.tool_configured("git"));

        assert!(store.reset().unwrap());
        assert!(!store.path().exists());
        assert!(!store.reset().unwrap());
    }

    #[test]
    fn test_legacy_marker_counts_as_ran() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join(".extensions-installed");
        std::fs::write(&marker, "").unwrap();

        let store = StateStore::new(dir.path().join("state.json")).with_legacy_marker(&marker);
        let state = store.load().unwrap();
        assert!(state.has_run());
        assert!(state.extensions.is_empty());

        store.reset().unwrap();
        assert!(!marker.exists());
        assert!(!store.load().unwrap().has_run());
    }

    #[test]
    fn test_corrupt_state_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = StateStore::new(&path).load();
        assert!(matches!(result, Err(ExtensionError::State(_))));
    }

    #[test]
    fn test_failed_listing() {
        let mut state = InstallState::default();
        state.record_failed(&"b.two".parse().unwrap(), Some("2.0.0"), "partial");
        state.record_installed(&"a.one".parse().unwrap(), "1.0.0");
        assert_eq!(state.failed(), vec!["b.two"]);
    }
}
