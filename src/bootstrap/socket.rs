//! Control-plane socket permission fixup.
//!
//! A container runtime socket mounted from the host usually belongs to a
//! group that does not exist inside the container. The fixup locates the
//! socket, then either adds the user to a group with the socket's gid or,
//! failing that, relaxes the socket mode.

use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::provider::{first_available, Provider};
use super::{BootstrapContext, Step, StepError, StepOutcome};
use crate::core::{retry, RetryConfig, SocketConfig};

/// Group created for the socket gid when no group has it yet.
pub const DEFAULT_SOCKET_GROUP: &str = "docker-host";

/// Mode used when group access cannot be arranged.
const PERMISSIVE_MODE: u32 = 0o666;

/// Group file consulted for gid lookups.
const GROUP_FILE: &str = "/etc/group";

/// A fixed candidate socket path.
#[derive(Debug, Clone)]
pub struct SocketPathProvider {
    path: PathBuf,
}

impl SocketPathProvider {
    /// Create a provider for one path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Provider for SocketPathProvider {
    type Output = PathBuf;

    fn describe(&self) -> String {
        format!("socket path {}", self.path.display())
    }

    fn provide(&self) -> Option<PathBuf> {
        let metadata = std::fs::metadata(&self.path).ok()?;
        metadata.file_type().is_socket().then(|| self.path.clone())
    }
}

/// Socket named by a `unix://` `DOCKER_HOST` value.
#[derive(Debug, Clone, Default)]
pub struct DockerHostProvider {
    value: Option<String>,
}

impl DockerHostProvider {
    /// Read `DOCKER_HOST` from the environment.
    pub fn from_env() -> Self {
        Self { value: std::env::var("DOCKER_HOST").ok() }
    }

    /// Use an explicit `DOCKER_HOST` value.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self { value: Some(value.into()) }
    }

    /// Socket path named by the value, if it is a unix URL.
    pub fn socket_path(&self) -> Option<PathBuf> {
        self.value.as_deref()?.strip_prefix("unix://").filter(|p| !p.is_empty()).map(PathBuf::from)
    }
}

impl Provider for DockerHostProvider {
    type Output = PathBuf;

    fn describe(&self) -> String {
        format!("DOCKER_HOST={}", self.value.as_deref().unwrap_or("<unset>"))
    }

    fn provide(&self) -> Option<PathBuf> {
        SocketPathProvider::new(self.socket_path()?).provide()
    }
}

/// Numeric identity of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// User id
    pub uid: u32,

    /// Primary and supplementary group ids
    pub gids: Vec<u32>,
}

/// Whether `user` may read and write a file with the given owner and mode.
pub fn grants_access(mode: u32, owner_uid: u32, owner_gid: u32, user: &UserIdentity) -> bool {
    if user.uid == 0 {
        return true;
    }
    if user.uid == owner_uid {
        return mode & 0o600 == 0o600;
    }
    if user.gids.contains(&owner_gid) && mode & 0o060 == 0o060 {
        return true;
    }
    mode & 0o006 == 0o006
}

/// Account and permission operations used by the fixup.
pub trait AccountOps {
    /// Look up a user's uid and groups.
    fn identity(&self, user: &str) -> Result<UserIdentity, StepError>;

    /// Name of the group with this gid, if any.
    fn group_for_gid(&self, gid: u32) -> Option<String>;

    /// Create a group with a fixed gid.
    fn create_group(&self, name: &str, gid: u32) -> Result<(), StepError>;

    /// Add a user to a supplementary group.
    fn add_user_to_group(&self, user: &str, group: &str) -> Result<(), StepError>;

    /// Change a file's mode.
    fn set_mode(&self, path: &Path, mode: u32) -> Result<(), StepError>;
}

/// [`AccountOps`] backed by `id`, `groupadd`, `usermod`, and `/etc/group`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAccounts;

fn run_capture(program: &str, args: &[&str]) -> Result<String, StepError> {
    let output = Command::new(program).args(args).output().map_err(|e| StepError::Command {
        program: program.to_string(),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(StepError::Command {
            program: program.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_ids(program: &str, output: &str) -> Result<Vec<u32>, StepError> {
    output
        .split_whitespace()
        .map(|raw| {
            raw.parse().map_err(|_| StepError::Command {
                program: program.to_string(),
                reason: format!("unexpected output '{raw}'"),
            })
        })
        .collect()
}

/// Find the group name for `gid` in `/etc/group` formatted content.
pub(crate) fn group_name_for_gid(content: &str, gid: u32) -> Option<String> {
    content.lines().find_map(|line| {
        let mut fields = line.split(':');
        let name = fields.next()?;
        let _password = fields.next()?;
        let id: u32 = fields.next()?.parse().ok()?;
        (id == gid && !name.is_empty()).then(|| name.to_string())
    })
}

impl AccountOps for SystemAccounts {
    fn identity(&self, user: &str) -> Result<UserIdentity, StepError> {
        let uid = parse_ids("id", &run_capture("id", &["-u", user])?)?
            .first()
            .copied()
            .ok_or_else(|| StepError::NotFound(format!("no uid for user '{user}'")))?;
        let gids = parse_ids("id", &run_capture("id", &["-G", user])?)?;
        Ok(UserIdentity { uid, gids })
    }

    fn group_for_gid(&self, gid: u32) -> Option<String> {
        let content = std::fs::read_to_string(GROUP_FILE).ok()?;
        group_name_for_gid(&content, gid)
    }

    fn create_group(&self, name: &str, gid: u32) -> Result<(), StepError> {
        run_capture("groupadd", &["-g", &gid.to_string(), name]).map(|_| ())
    }

    fn add_user_to_group(&self, user: &str, group: &str) -> Result<(), StepError> {
        run_capture("usermod", &["-aG", group, user]).map(|_| ())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<(), StepError> {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        Ok(())
    }
}

/// Bootstrap step that makes the control-plane socket usable.
pub struct SocketFixupStep {
    enabled: bool,
    providers: Vec<Box<dyn Provider<Output = PathBuf>>>,
    user: String,
    group: String,
    accounts: Box<dyn AccountOps>,
    detect_retry: RetryConfig,
    verify_retry: RetryConfig,
}

impl SocketFixupStep {
    /// Create a step with explicit providers.
    pub fn new(
        providers: Vec<Box<dyn Provider<Output = PathBuf>>>,
        user: impl Into<String>,
        accounts: Box<dyn AccountOps>,
    ) -> Self {
        Self {
            enabled: true,
            providers,
            user: user.into(),
            group: DEFAULT_SOCKET_GROUP.to_string(),
            accounts,
            detect_retry: RetryConfig::default(),
            verify_retry: RetryConfig::default(),
        }
    }

    /// Build the step from configuration: `DOCKER_HOST` first, then the
    /// configured candidate paths.
    pub fn from_config(config: &SocketConfig, user: &str, accounts: Box<dyn AccountOps>) -> Self {
        let mut providers: Vec<Box<dyn Provider<Output = PathBuf>>> =
            vec![Box::new(DockerHostProvider::from_env())];
        providers.extend(
            config
                .candidates
                .iter()
                .map(|p| Box::new(SocketPathProvider::new(p)) as Box<dyn Provider<Output = PathBuf>>),
        );

        Self::new(providers, user, accounts).retries(config.detect_retry(), config.verify_retry())
    }

    /// A step that always reports itself as skipped.
    pub fn disabled() -> Self {
        let mut step = Self::new(Vec::new(), "", Box::new(SystemAccounts));
        step.enabled = false;
        step
    }

    /// Set detection and verification retry settings.
    #[must_use]
    pub fn retries(mut self, detect: RetryConfig, verify: RetryConfig) -> Self {
        self.detect_retry = detect;
        self.verify_retry = verify;
        self
    }

    /// Group name to create when the socket gid has none.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    fn detect(&self) -> Option<PathBuf> {
        retry(&self.detect_retry, |_| first_available(&self.providers).ok_or(())).into_result().ok()
    }

    fn accessible(&self, socket: &Path) -> Result<bool, StepError> {
        let metadata = std::fs::metadata(socket)?;
        let identity = self.accounts.identity(&self.user)?;
        Ok(grants_access(metadata.mode(), metadata.uid(), metadata.gid(), &identity))
    }

    fn verify(&self, socket: &Path) -> bool {
        retry(&self.verify_retry, |_| match self.accessible(socket) {
            Ok(true) => Ok(()),
            Ok(false) => Err(()),
            Err(e) => {
                tracing::debug!("Access check failed: {}", e);
                Err(())
            }
        })
        .is_ok()
    }

    fn grant_group(&self, gid: u32) -> Result<String, StepError> {
        let group = match self.accounts.group_for_gid(gid) {
            Some(existing) => existing,
            None => {
                self.accounts.create_group(&self.group, gid)?;
                self.group.clone()
            }
        };
        self.accounts.add_user_to_group(&self.user, &group)?;
        Ok(group)
    }

    fn fix(&self, socket: &Path) -> Result<String, StepError> {
        if self.accessible(socket)? {
            return Ok(format!("{} already accessible to {}", socket.display(), self.user));
        }

        // Never hand out membership of the root group.
        let gid = std::fs::metadata(socket)?.gid();
        if gid != 0 {
            match self.grant_group(gid) {
                Ok(group) if self.verify(socket) => {
                    return Ok(format!("added {} to group {} (gid {})", self.user, group, gid));
                }
                Ok(group) => tracing::warn!(
                    "Joined group {} but {} is still not accessible, relaxing mode",
                    group,
                    socket.display()
                ),
                Err(e) => tracing::warn!("Group fixup failed ({}), relaxing mode", e),
            }
        }

        self.accounts.set_mode(socket, PERMISSIVE_MODE)?;
        if self.verify(socket) {
            Ok(format!("set mode {:o} on {}", PERMISSIVE_MODE, socket.display()))
        } else {
            Err(StepError::Permission(format!(
                "{} is still not accessible to {}",
                socket.display(),
                self.user
            )))
        }
    }
}

impl Step for SocketFixupStep {
    fn name(&self) -> &str {
        "socket"
    }

    fn run(&mut self, ctx: &mut BootstrapContext) -> StepOutcome {
        if !self.enabled {
            return StepOutcome::Skipped("disabled".to_string());
        }

        let Some(socket) = self.detect() else {
            let tried: Vec<_> = self.providers.iter().map(|p| p.describe()).collect();
            return StepOutcome::Failed(StepError::NotFound(format!(
                "no control-plane socket found (tried {})",
                tried.join(", ")
            )));
        };

        tracing::debug!("Found control-plane socket at {}", socket.display());
        ctx.socket = Some(socket.clone());

        match self.fix(&socket) {
            Ok(detail) => StepOutcome::Completed(detail),
            Err(e) => StepOutcome::Failed(e),
        }
    }
}

/// Simulates account changes in memory.
#[cfg(test)]
pub(crate) struct FakeAccounts {
    pub identity: std::cell::RefCell<UserIdentity>,
    pub groups: std::cell::RefCell<std::collections::HashMap<String, u32>>,
    pub fail_group: bool,
    pub fail_mode: bool,
}

#[cfg(test)]
impl FakeAccounts {
    pub(crate) fn new(uid: u32) -> Self {
        Self {
            identity: std::cell::RefCell::new(UserIdentity { uid, gids: Vec::new() }),
            groups: std::cell::RefCell::new(std::collections::HashMap::new()),
            fail_group: false,
            fail_mode: false,
        }
    }
}

#[cfg(test)]
impl AccountOps for FakeAccounts {
    fn identity(&self, _user: &str) -> Result<UserIdentity, StepError> {
        Ok(self.identity.borrow().clone())
    }

    fn group_for_gid(&self, gid: u32) -> Option<String> {
        self.groups.borrow().iter().find(|(_, g)| **g == gid).map(|(name, _)| name.clone())
    }

    fn create_group(&self, name: &str, gid: u32) -> Result<(), StepError> {
        self.groups.borrow_mut().insert(name.to_string(), gid);
        Ok(())
    }

    fn add_user_to_group(&self, _user: &str, group: &str) -> Result<(), StepError> {
        if self.fail_group {
            return Err(StepError::Command {
                program: "usermod".to_string(),
                reason: "permission denied".to_string(),
            });
        }
        if let Some(gid) = self.groups.borrow().get(group) {
            self.identity.borrow_mut().gids.push(*gid);
        }
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<(), StepError> {
        if self.fail_mode {
            return Ok(());
        }
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        Ok(())
    }
}
