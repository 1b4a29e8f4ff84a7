//! Artifact installer.
//!
//! Downloads a package once into a scoped temporary directory, extracts the
//! `extension/` payload, and copies it into every install target as
//! `<target>/<publisher.name>-<version>/`.

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use walkdir::WalkDir;

use super::{ExtensionError, ExtensionRecord, ExtensionResult, Registry};

/// Archive subdirectory that holds the installable payload.
pub const PAYLOAD_DIR: &str = "extension";

/// Prefix for scoped temporary directories.
const TEMP_PREFIX: &str = "devboot-";

/// A directory an editor loads extensions from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallTarget {
    /// Editor family name (e.g. "vscode")
    pub name: String,

    /// Extensions directory
    pub path: PathBuf,

    /// Skip this target when the editor's own directory (the parent of
    /// `path`) does not exist
    #[serde(default)]
    pub only_if_exists: bool,
}

impl InstallTarget {
    /// Create a target that is always populated.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), path: path.into(), only_if_exists: false }
    }

    /// Whether the target should be skipped on this machine.
    pub fn is_absent(&self) -> bool {
        self.only_if_exists && !self.path.parent().is_some_and(Path::exists)
    }
}

/// Result of installing into one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    /// Payload copied to the given directory.
    Installed(PathBuf),
    /// Target not present on this machine.
    Skipped,
    /// Copy failed.
    Failed(String),
}

/// Per-target outcome.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    /// Target name
    pub name: String,

    /// Target directory
    pub path: PathBuf,

    /// What happened
    pub status: TargetStatus,
}

impl TargetOutcome {
    /// Whether the payload landed in this target.
    pub fn is_installed(&self) -> bool {
        matches!(self.status, TargetStatus::Installed(_))
    }

    /// Whether the copy failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.status, TargetStatus::Failed(_))
    }
}

/// Outcome of installing one extension into all targets.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// The installed record
    pub record: ExtensionRecord,

    /// One entry per target, in target order
    pub targets: Vec<TargetOutcome>,
}

impl InstallOutcome {
    /// Targets that failed.
    pub fn failed_targets(&self) -> Vec<PathBuf> {
        self.targets.iter().filter(|t| t.is_failed()).map(|t| t.path.clone()).collect()
    }

    /// Number of targets the payload landed in.
    pub fn installed_count(&self) -> usize {
        self.targets.iter().filter(|t| t.is_installed()).count()
    }

    /// Error describing a failed or partial install, if any.
    ///
    /// Successful copies are never rolled back, so a partial install leaves
    /// the extension present in the targets that worked.
    pub fn error(&self) -> Option<ExtensionError> {
        let failed = self.failed_targets();
        if failed.is_empty() {
            return None;
        }

        let id = self.record.id.clone();
        if self.installed_count() == 0 {
            let reasons: Vec<_> = self
                .targets
                .iter()
                .filter_map(|t| match &t.status {
                    TargetStatus::Failed(reason) => Some(format!("{}: {}", t.path.display(), reason)),
                    _ => None,
                })
                .collect();
            return Some(ExtensionError::TransferFailed {
                id,
                reason: format!("all targets failed ({})", reasons.join("; ")),
            });
        }

        Some(ExtensionError::PartialInstall { id, failed })
    }

    /// Convert into a result, keeping the outcome on success.
    pub fn into_result(self) -> ExtensionResult<Self> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Installs registry artifacts into install targets.
pub struct ArtifactInstaller<'a, R: Registry + ?Sized> {
    /// Where artifacts come from
    registry: &'a R,

    /// Verify downloads against the registry's SHA-256 when it has one
    verify_checksums: bool,

    /// Parent for scoped temp directories (system temp dir when `None`)
    temp_root: Option<PathBuf>,
}

impl<'a, R: Registry + ?Sized> ArtifactInstaller<'a, R> {
    /// Create an installer backed by the given registry.
    pub fn new(registry: &'a R) -> Self {
        Self { registry, verify_checksums: true, temp_root: None }
    }

    /// Enable or disable checksum verification.
    #[must_use]
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Create scoped temp directories under `root`.
    #[must_use]
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    fn scoped_temp_dir(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        match &self.temp_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }

    /// Download, extract, and copy `record` into every target.
    ///
    /// The artifact is transferred exactly once regardless of target count.
    /// Download and extraction failures are returned as `TransferFailed`;
    /// per-target copy failures are reported in the outcome. Nothing is
    /// downloaded when no target is present (`NoTargets`).
    pub fn install(
        &self,
        record: &ExtensionRecord,
        targets: &[InstallTarget],
    ) -> ExtensionResult<InstallOutcome> {
        if targets.iter().all(InstallTarget::is_absent) {
            return Err(ExtensionError::NoTargets { id: record.id.clone() });
        }

        // Dropped on every return path, removing the directory.
        let scratch = self.scoped_temp_dir()?;

        let artifact = scratch.path().join(record.artifact_name());
        self.fetch_verified(record, &artifact)?;

        let payload = extract_payload(record, &artifact, &scratch.path().join("unpacked"))?;

        let dir_name = record.dir_name();
        let mut outcomes = Vec::with_capacity(targets.len());

        for target in targets {
            let status = if target.is_absent() {
                tracing::debug!("Skipping absent target {}", target.path.display());
                TargetStatus::Skipped
            } else {
                let dest = target.path.join(&dir_name);
                match install_into(&payload, &target.path, &dest) {
                    Ok(()) => {
                        tracing::debug!("Installed {} into {}", record.id, dest.display());
                        TargetStatus::Installed(dest)
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to install {} into {}: {}",
                            record.id,
                            target.path.display(),
                            e
                        );
                        TargetStatus::Failed(e.to_string())
                    }
                }
            };

            outcomes.push(TargetOutcome {
                name: target.name.clone(),
                path: target.path.clone(),
                status,
            });
        }

        if let Err(e) = scratch.close() {
            tracing::warn!("Failed to remove temporary directory: {}", e);
        }

        Ok(InstallOutcome { record: record.clone(), targets: outcomes })
    }

    /// Download the artifact into `out_dir` without installing it.
    ///
    /// Returns the path of the `.vsix` file.
    pub fn download_to(&self, record: &ExtensionRecord, out_dir: &Path) -> ExtensionResult<PathBuf> {
        fs::create_dir_all(out_dir)?;

        let partial = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(out_dir)?;
        self.fetch_verified(record, partial.path())?;

        let dest = out_dir.join(record.artifact_name());
        partial.persist(&dest).map_err(|e| ExtensionError::Io(e.error))?;

        Ok(dest)
    }

    fn fetch_verified(&self, record: &ExtensionRecord, dest: &Path) -> ExtensionResult<()> {
        self.registry.download(record, dest)?;

        if !self.verify_checksums {
            return Ok(());
        }

        if let Some(expected) = self.registry.fetch_checksum(record)? {
            let actual = sha256_file(dest)?;
            if !actual.eq_ignore_ascii_case(&expected) {
                return Err(ExtensionError::transfer(
                    &record.id,
                    format!("checksum mismatch: expected {expected}, got {actual}"),
                ));
            }
            tracing::debug!("Checksum verified for {}", record.id);
        }

        Ok(())
    }
}

/// SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Extract the `extension/` subtree of the archive into `unpack_dir`.
///
/// Returns the payload directory. Entries outside `extension/` are ignored,
/// as are entries whose path would escape the unpack directory.
fn extract_payload(
    record: &ExtensionRecord,
    archive_path: &Path,
    unpack_dir: &Path,
) -> ExtensionResult<PathBuf> {
    let id = &record.id;
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ExtensionError::transfer(id, format!("invalid archive: {e}")))?;

    let mut payload_entries = 0usize;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtensionError::transfer(id, format!("invalid archive entry: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive entry '{}' in {}", entry.name(), id);
            continue;
        };

        if !is_payload_path(&relative) {
            continue;
        }

        let out_path = unpack_dir.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)?;
            io::copy(&mut entry, &mut out)?;

            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
        payload_entries += 1;
    }

    let payload = unpack_dir.join(PAYLOAD_DIR);
    if payload_entries == 0 || !payload.is_dir() {
        return Err(ExtensionError::transfer(id, format!("archive has no '{PAYLOAD_DIR}/' payload")));
    }

    Ok(payload)
}

fn is_payload_path(path: &Path) -> bool {
    let mut components = path.components();
    matches!(components.next(), Some(Component::Normal(first)) if first == PAYLOAD_DIR)
        && components.next().is_some()
}

/// Replace `dest` with a copy of `payload`, creating `target_dir` first.
fn install_into(payload: &Path, target_dir: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(target_dir)?;

    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }

    copy_tree(payload, dest)
}

/// Recursively copy a directory tree.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let out = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extension::ExtensionId;
    use std::cell::{Cell, RefCell};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a zip archive from `(name, content)` pairs.
    pub(crate) fn build_vsix(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).expect("start zip file");
            writer.write_all(content.as_bytes()).expect("write zip payload");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    pub(crate) fn sample_vsix() -> Vec<u8> {
        build_vsix(&[
            ("extension.vsixmanifest", "<PackageManifest/>"),
            ("[Content_Types].xml", "<Types/>"),
            ("extension/package.json", r#"{"name": "vscode-yaml"}"#),
            ("extension/dist/extension.js", "module.exports = {};"),
        ])
    }

    /// In-memory registry that counts artifact transfers.
    pub(crate) struct FakeRegistry {
        pub artifacts: RefCell<std::collections::HashMap<String, Vec<u8>>>,
        pub checksums: RefCell<std::collections::HashMap<String, String>>,
        pub downloads: Cell<usize>,
        pub resolves: Cell<usize>,
    }

    impl FakeRegistry {
        pub(crate) fn new() -> Self {
            Self {
                artifacts: RefCell::new(std::collections::HashMap::new()),
                checksums: RefCell::new(std::collections::HashMap::new()),
                downloads: Cell::new(0),
                resolves: Cell::new(0),
            }
        }

        pub(crate) fn with(self, id: &str, version: &str, bytes: Vec<u8>) -> Self {
            self.artifacts.borrow_mut().insert(format!("{id}@{version}"), bytes);
            self
        }
    }

    impl Registry for FakeRegistry {
        fn resolve(&self, id: &ExtensionId) -> ExtensionResult<ExtensionRecord> {
            self.resolves.set(self.resolves.get() + 1);
            let prefix = format!("{id}@");
            let key = self
                .artifacts
                .borrow()
                .keys()
                .find(|k| k.starts_with(&prefix))
                .cloned()
                .ok_or_else(|| ExtensionError::not_found(id, "unknown extension"))?;
            let version = key.trim_start_matches(&prefix).to_string();
            Ok(ExtensionRecord {
                id: id.clone(),
                version,
                download_url: format!("fake://{key}"),
                sha256_url: None,
            })
        }

        fn download(&self, record: &ExtensionRecord, dest: &Path) -> ExtensionResult<()> {
            self.downloads.set(self.downloads.get() + 1);
            let key = format!("{}@{}", record.id, record.version);
            let bytes = self
                .artifacts
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| ExtensionError::transfer(&record.id, "no artifact"))?;
            fs::write(dest, bytes)?;
            Ok(())
        }

        fn fetch_checksum(&self, record: &ExtensionRecord) -> ExtensionResult<Option<String>> {
            Ok(self.checksums.borrow().get(&record.id.to_string()).cloned())
        }
    }

    fn record(id: &str, version: &str) -> ExtensionRecord {
        ExtensionRecord {
            id: id.parse().unwrap(),
            version: version.to_string(),
            download_url: "fake://".to_string(),
            sha256_url: None,
        }
    }

    fn assert_empty_dir(path: &Path) {
        let leftovers: Vec<_> = fs::read_dir(path).unwrap().collect();
        assert!(leftovers.is_empty(), "temp root not cleaned: {leftovers:?}");
    }

    #[test]
    fn test_install_downloads_once_for_many_targets() {
        let registry = FakeRegistry::new().with("redhat.vscode-yaml", "1.2.3", sample_vsix());
        let root = tempfile::TempDir::new().unwrap();
        let targets = vec![
            InstallTarget::new("a", root.path().join("a")),
            InstallTarget::new("b", root.path().join("b")),
            InstallTarget::new("c", root.path().join("c")),
        ];

        let installer = ArtifactInstaller::new(&registry).temp_root(root.path().join("tmp"));
        let outcome = installer.install(&record("redhat.vscode-yaml", "1.2.3"), &targets).unwrap();

        assert_eq!(registry.downloads.get(), 1);
        assert_eq!(outcome.installed_count(), 3);
        for target in &targets {
            let dir = target.path.join("redhat.vscode-yaml-1.2.3");
            assert!(dir.join("package.json").is_file());
            assert!(dir.join("dist/extension.js").is_file());
            assert!(!dir.join("extension.vsixmanifest").exists());
        }
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_temp_dir_removed_after_success() {
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", sample_vsix());
        let root = tempfile::TempDir::new().unwrap();
        let temp_root = root.path().join("tmp");

        ArtifactInstaller::new(&registry)
            .temp_root(&temp_root)
            .install(&record("foo.bar", "1.0.0"), &[InstallTarget::new("a", root.path().join("a"))])
            .unwrap();

        assert_empty_dir(&temp_root);
    }

    #[test]
    fn test_temp_dir_removed_after_download_failure() {
        let registry = FakeRegistry::new();
        let root = tempfile::TempDir::new().unwrap();
        let temp_root = root.path().join("tmp");

        let result = ArtifactInstaller::new(&registry)
            .temp_root(&temp_root)
            .install(&record("foo.bar", "1.0.0"), &[InstallTarget::new("a", root.path().join("a"))]);

        assert!(matches!(result, Err(ExtensionError::TransferFailed { .. })));
        assert_empty_dir(&temp_root);
    }

    #[test]
    fn test_archive_without_payload_is_transfer_failure() {
        let vsix = build_vsix(&[("extension.vsixmanifest", "<PackageManifest/>")]);
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", vsix);
        let root = tempfile::TempDir::new().unwrap();
        let temp_root = root.path().join("tmp");

        let result = ArtifactInstaller::new(&registry)
            .temp_root(&temp_root)
            .install(&record("foo.bar", "1.0.0"), &[InstallTarget::new("a", root.path().join("a"))]);

        assert!(matches!(result, Err(ExtensionError::TransferFailed { .. })));
        assert!(!root.path().join("a").join("foo.bar-1.0.0").exists());
        assert_empty_dir(&temp_root);
    }

    #[test]
    fn test_corrupt_archive_is_transfer_failure() {
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", b"not a zip".to_vec());
        let root = tempfile::TempDir::new().unwrap();

        let result = ArtifactInstaller::new(&registry)
            .temp_root(root.path().join("tmp"))
            .install(&record("foo.bar", "1.0.0"), &[InstallTarget::new("a", root.path().join("a"))]);

        assert!(matches!(result, Err(ExtensionError::TransferFailed { .. })));
    }

    #[test]
    fn test_unwritable_target_does_not_affect_others() {
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", sample_vsix());
        let root = tempfile::TempDir::new().unwrap();

        // A regular file where a directory is expected cannot be created, even as root.
        let blocker = root.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let good = InstallTarget::new("a", root.path().join("a"));
        let bad = InstallTarget::new("b", blocker.join("extensions"));

        let outcome = ArtifactInstaller::new(&registry)
            .temp_root(root.path().join("tmp"))
            .install(&record("foo.bar", "1.0.0"), &[good.clone(), bad.clone()])
            .unwrap();

        assert!(outcome.targets[0].is_installed());
        assert!(outcome.targets[1].is_failed());
        assert!(good.path.join("foo.bar-1.0.0/package.json").is_file());

        match outcome.error() {
            Some(ExtensionError::PartialInstall { failed, .. }) => assert_eq!(failed, vec![bad.path]),
            other => panic!("expected PartialInstall, got {other:?}"),
        }
    }

    #[test]
    fn test_all_targets_failing_is_transfer_failure() {
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", sample_vsix());
        let root = tempfile::TempDir::new().unwrap();
        let blocker = root.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let outcome = ArtifactInstaller::new(&registry)
            .temp_root(root.path().join("tmp"))
            .install(&record("foo.bar", "1.0.0"), &[InstallTarget::new("b", blocker.join("x"))])
            .unwrap();

        assert!(matches!(outcome.into_result(), Err(ExtensionError::TransferFailed { .. })));
    }

    #[test]
    fn test_reinstall_replaces_existing_version() {
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", sample_vsix());
        let root = tempfile::TempDir::new().unwrap();
        let target = InstallTarget::new("a", root.path().join("a"));
        let stale = target.path.join("foo.bar-1.0.0/stale.txt");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old").unwrap();

        ArtifactInstaller::new(&registry)
            .temp_root(root.path().join("tmp"))
            .install(&record("foo.bar", "1.0.0"), &[target.clone()])
            .unwrap();

        assert!(!stale.exists());
        assert!(target.path.join("foo.bar-1.0.0/package.json").is_file());
    }

    #[test]
    fn test_absent_editor_target_is_skipped() {
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", sample_vsix());
        let root = tempfile::TempDir::new().unwrap();
        let mut absent = InstallTarget::new("cursor", root.path().join("missing-editor/extensions"));
        absent.only_if_exists = true;
        let present = InstallTarget::new("vscode", root.path().join("vscode"));

        let outcome = ArtifactInstaller::new(&registry)
            .temp_root(root.path().join("tmp"))
            .install(&record("foo.bar", "1.0.0"), &[present.clone(), absent.clone()])
            .unwrap();

        assert!(outcome.targets[0].is_installed());
        assert_eq!(outcome.targets[1].status, TargetStatus::Skipped);
        assert!(!absent.path.exists());
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_no_present_target_fails_without_download() {
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", sample_vsix());
        let root = tempfile::TempDir::new().unwrap();
        let mut absent = InstallTarget::new("cursor", root.path().join("missing-editor/extensions"));
        absent.only_if_exists = true;
        let installer = ArtifactInstaller::new(&registry).temp_root(root.path().join("tmp"));

        let result = installer.install(&record("foo.bar", "1.0.0"), &[absent.clone()]);
        assert!(matches!(result, Err(ExtensionError::NoTargets { .. })));

        let result = installer.install(&record("foo.bar", "1.0.0"), &[]);
        assert!(matches!(result, Err(ExtensionError::NoTargets { .. })));

        assert_eq!(registry.downloads.get(), 0);
        assert!(!absent.path.exists());
    }

    #[test]
    fn test_checksum_mismatch_is_rejected() {
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", sample_vsix());
        registry.checksums.borrow_mut().insert("foo.bar".to_string(), "00".repeat(32));
        let root = tempfile::TempDir::new().unwrap();

        let result = ArtifactInstaller::new(&registry)
            .temp_root(root.path().join("tmp"))
            .install(&record("foo.bar", "1.0.0"), &[InstallTarget::new("a", root.path().join("a"))]);
        assert!(matches!(result, Err(ExtensionError::TransferFailed { .. })));

        let outcome = ArtifactInstaller::new(&registry)
            .verify_checksums(false)
            .temp_root(root.path().join("tmp"))
            .install(&record("foo.bar", "1.0.0"), &[InstallTarget::new("a", root.path().join("a"))])
            .unwrap();
        assert_eq!(outcome.installed_count(), 1);
    }

    #[test]
    fn test_checksum_match_is_accepted() {
        let vsix = sample_vsix();
        let digest = format!("{:x}", Sha256::digest(&vsix));
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", vsix);
        registry.checksums.borrow_mut().insert("foo.bar".to_string(), digest.to_uppercase());
        let root = tempfile::TempDir::new().unwrap();

        let outcome = ArtifactInstaller::new(&registry)
            .temp_root(root.path().join("tmp"))
            .install(&record("foo.bar", "1.0.0"), &[InstallTarget::new("a", root.path().join("a"))])
            .unwrap();
        assert_eq!(outcome.installed_count(), 1);
    }

    #[test]
    fn test_sha256_file_matches_digest() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("big.vsix");
        let bytes: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &bytes).unwrap();

        assert_eq!(sha256_file(&path).unwrap(), format!("{:x}", Sha256::digest(&bytes)));
        assert!(sha256_file(&root.path().join("missing.vsix")).is_err());
    }

    #[test]
    fn test_download_to_writes_vsix_only() {
        let vsix = sample_vsix();
        let registry = FakeRegistry::new().with("foo.bar", "1.0.0", vsix.clone());
        let out = tempfile::TempDir::new().unwrap();

        let path = ArtifactInstaller::new(&registry)
            .download_to(&record("foo.bar", "1.0.0"), out.path())
            .unwrap();

        assert_eq!(path, out.path().join("foo.bar-1.0.0.vsix"));
        assert_eq!(fs::read(&path).unwrap(), vsix);
        let entries: Vec<_> = fs::read_dir(out.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_is_payload_path() {
        assert!(is_payload_path(Path::new("extension/package.json")));
        assert!(!is_payload_path(Path::new("extension")));
        assert!(!is_payload_path(Path::new("extension.vsixmanifest")));
        assert!(!is_payload_path(Path::new("other/extension/package.json")));
    }
}
