//! Extension registry client.
//!
//! Resolves `publisher.name` identifiers against an Open VSX compatible
//! registry (`GET {registry}/api/{publisher}/{name}`) and downloads the
//! package artifacts it points to.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{ExtensionError, ExtensionId, ExtensionResult};

/// Default registry URL.
pub const DEFAULT_REGISTRY_URL: &str = "https://open-vsx.org";

/// Default HTTP timeout for registry calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A resolved extension: what to download and which version it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRecord {
    /// Extension identifier
    pub id: ExtensionId,

    /// Resolved version (not parsed)
    pub version: String,

    /// Download URL of the package artifact
    pub download_url: String,

    /// URL of a file holding the artifact's SHA-256 digest
    pub sha256_url: Option<String>,
}

impl ExtensionRecord {
    /// Directory name this record installs into.
    pub fn dir_name(&self) -> String {
        self.id.versioned_dir_name(&self.version)
    }

    /// File name for the downloaded artifact.
    pub fn artifact_name(&self) -> String {
        format!("{}.vsix", self.dir_name())
    }
}

/// Source of extension metadata and artifacts.
pub trait Registry {
    /// Resolve an identifier to a record. Never retried.
    fn resolve(&self, id: &ExtensionId) -> ExtensionResult<ExtensionRecord>;

    /// Download the record's artifact into `dest`.
    fn download(&self, record: &ExtensionRecord, dest: &Path) -> ExtensionResult<()>;

    /// Expected SHA-256 hex digest of the artifact, if the registry publishes one.
    fn fetch_checksum(&self, _record: &ExtensionRecord) -> ExtensionResult<Option<String>> {
        Ok(None)
    }
}

/// Metadata endpoint response. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    version: Option<String>,

    #[serde(default)]
    files: Option<MetadataFiles>,

    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MetadataFiles {
    #[serde(default)]
    download: Option<String>,

    #[serde(default)]
    sha256: Option<String>,
}

/// Parse a metadata response body into a record.
///
/// Any missing or empty `version` / `files.download`, or an `error` field,
/// yields `NotFound`.
pub fn parse_metadata(id: &ExtensionId, body: &str) -> ExtensionResult<ExtensionRecord> {
    let response: MetadataResponse = serde_json::from_str(body)
        .map_err(|e| ExtensionError::not_found(id, format!("invalid metadata: {e}")))?;

    if let Some(error) = response.error {
        let reason = error.as_str().map_or_else(|| error.to_string(), str::to_string);
        return Err(ExtensionError::not_found(id, reason));
    }

    let version = response
        .version
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ExtensionError::not_found(id, "metadata has no version"))?;

    let files = response.files.ok_or_else(|| ExtensionError::not_found(id, "metadata has no files"))?;

    let download_url = files
        .download
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ExtensionError::not_found(id, "metadata has no download URL"))?;

    Ok(ExtensionRecord {
        id: id.clone(),
        version,
        download_url,
        sha256_url: files.sha256.filter(|u| !u.trim().is_empty()),
    })
}

/// Registry client over HTTP.
pub struct HttpRegistry {
    /// Registry base URL, without trailing slash
    base_url: String,

    /// HTTP client
    client: reqwest::blocking::Client,
}

impl HttpRegistry {
    /// Create a client for the default registry.
    pub fn new() -> ExtensionResult<Self> {
        Self::with_url(DEFAULT_REGISTRY_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom registry URL and timeout.
    pub fn with_url(url: &str, timeout: Duration) -> ExtensionResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(format!("devboot/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExtensionError::Http(e.to_string()))?;

        Ok(Self { base_url: url.trim_end_matches('/').to_string(), client })
    }

    /// Registry base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Metadata endpoint for an identifier.
    pub fn metadata_url(&self, id: &ExtensionId) -> String {
        format!(
            "{}/api/{}/{}",
            self.base_url,
            urlencoding::encode(id.publisher()),
            urlencoding::encode(id.name())
        )
    }
}

impl Registry for HttpRegistry {
    fn resolve(&self, id: &ExtensionId) -> ExtensionResult<ExtensionRecord> {
        let url = self.metadata_url(id);
        tracing::debug!("Resolving {} via {}", id, url);

        let response =
            self.client.get(&url).send().map_err(|e| ExtensionError::not_found(id, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtensionError::not_found(id, format!("HTTP {}", response.status())));
        }

        let body = response.text().map_err(|e| ExtensionError::not_found(id, e.to_string()))?;
        parse_metadata(id, &body)
    }

    fn download(&self, record: &ExtensionRecord, dest: &Path) -> ExtensionResult<()> {
        let id = &record.id;
        tracing::debug!("Downloading {} from {}", id, record.download_url);

        let mut response = self
            .client
            .get(&record.download_url)
            .send()
            .map_err(|e| ExtensionError::transfer(id, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtensionError::transfer(
                id,
                format!("failed to download artifact: HTTP {}", response.status()),
            ));
        }

        let mut file = File::create(dest)?;
        let bytes = response.copy_to(&mut file).map_err(|e| ExtensionError::transfer(id, e.to_string()))?;
        file.flush()?;

        tracing::debug!("Downloaded {} bytes for {}", bytes, id);
        Ok(())
    }

    fn fetch_checksum(&self, record: &ExtensionRecord) -> ExtensionResult<Option<String>> {
        let Some(url) = record.sha256_url.as_deref() else {
            return Ok(None);
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ExtensionError::transfer(&record.id, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtensionError::transfer(
                &record.id,
                format!("failed to fetch checksum: HTTP {}", response.status()),
            ));
        }

        let body = response.text().map_err(|e| ExtensionError::transfer(&record.id, e.to_string()))?;
        Ok(parse_checksum(&body))
    }
}

/// First whitespace-separated token of a checksum file, lowercased.
pub fn parse_checksum(body: &str) -> Option<String> {
    body.split_whitespace().next().map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    fn id(raw: &str) -> ExtensionId {
        raw.parse().unwrap()
    }

    /// Serve the given (status line, body) pairs, one per connection.
    fn start_http_fixture(responses: Vec<(&'static str, Vec<u8>)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind http fixture");
        let addr = listener.local_addr().expect("local addr");
        thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let headers = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                stream.write_all(headers.as_bytes()).expect("write headers");
                stream.write_all(&body).expect("write body");
                stream.flush().expect("flush");
            }
        });
        format!("http://{addr}")
    }

    fn registry(url: &str) -> HttpRegistry {
        HttpRegistry::with_url(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_metadata_complete() {
        let body = r#"{
            "namespace": "redhat",
            "name": "vscode-yaml",
            "version": "1.2.3",
            "files": {
                "download": "https://example/x.vsix",
                "sha256": "https://example/x.sha256",
                "icon": "https://example/icon.png"
            }
        }"#;

        let record = parse_metadata(&id("redhat.vscode-yaml"), body).unwrap();
        assert_eq!(record.version, "1.2.3");
        assert_eq!(record.download_url, "https://example/x.vsix");
        assert_eq!(record.sha256_url.as_deref(), Some("https://example/x.sha256"));
        assert_eq!(record.dir_name(), "redhat.vscode-yaml-1.2.3");
    }

    #[test]
    fn test_parse_metadata_never_returns_partial_record() {
        let cases = [
            r#"{"files": {"download": "https://example/x.vsix"}}"#,
            r#"{"version": "1.0.0"}"#,
            r#"{"version": "1.0.0", "files": {}}"#,
            r#"{"version": "", "files": {"download": "https://example/x.vsix"}}"#,
            r#"{"version": "1.0.0", "files": {"download": "  "}}"#,
            r#"{"error": "Extension not found: foo.bar"}"#,
            r#"{"version": "1.0.0", "files": {"download": "u"}, "error": {"code": 1}}"#,
            "not json",
        ];

        for body in cases {
            let result = parse_metadata(&id("foo.bar"), body);
            assert!(
                matches!(result, Err(ExtensionError::NotFound { .. })),
                "expected NotFound for {body}"
            );
        }
    }

    #[test]
    fn test_error_field_reason_is_kept() {
        let err = parse_metadata(&id("foo.bar"), r#"{"error": "Extension not found: foo.bar"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Extension not found: foo.bar"));
    }

    #[test]
    fn test_metadata_url_encodes_segments() {
        let registry = registry("https://open-vsx.org/");
        assert_eq!(registry.base_url(), "https://open-vsx.org");
        assert_eq!(
            registry.metadata_url(&id("redhat.vscode-yaml")),
            "https://open-vsx.org/api/redhat/vscode-yaml"
        );
        let spaced = ExtensionId::new("a", "b c").unwrap();
        assert_eq!(registry.metadata_url(&spaced), "https://open-vsx.org/api/a/b%20c");
    }

    #[test]
    fn test_parse_checksum() {
        assert_eq!(parse_checksum("ABCDEF  x.vsix\n").as_deref(), Some("abcdef"));
        assert_eq!(parse_checksum("   \n"), None);
    }

    #[test]
    fn test_resolve_over_http() {
        let body = br#"{"version": "1.2.3", "files": {"download": "https://example/x.vsix"}}"#;
        let url = start_http_fixture(vec![("200 OK", body.to_vec())]);

        let record = registry(&url).resolve(&id("redhat.vscode-yaml")).unwrap();
        assert_eq!(record.version, "1.2.3");
        assert_eq!(record.download_url, "https://example/x.vsix");
    }

    #[test]
    fn test_resolve_http_error_is_not_found() {
        let url = start_http_fixture(vec![("404 Not Found", b"{}".to_vec())]);

        let result = registry(&url).resolve(&id("foo.bar"));
        assert!(matches!(result, Err(ExtensionError::NotFound { .. })));
    }

    #[test]
    fn test_resolve_unreachable_is_not_found() {
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let result = registry(&format!("http://127.0.0.1:{port}")).resolve(&id("foo.bar"));
        assert!(matches!(result, Err(ExtensionError::NotFound { .. })));
    }

    #[test]
    fn test_download_writes_artifact() {
        let url = start_http_fixture(vec![("200 OK", b"artifact-bytes".to_vec())]);
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("x.vsix");

        let record = ExtensionRecord {
            id: id("foo.bar"),
            version: "1.0.0".to_string(),
            download_url: format!("{url}/x.vsix"),
            sha256_url: None,
        };

        registry(&url).download(&record, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"artifact-bytes");
    }

    #[test]
    fn test_download_http_error_is_transfer_failed() {
        let url = start_http_fixture(vec![("500 Internal Server Error", Vec::new())]);
        let dir = tempfile::TempDir::new().unwrap();

        let record = ExtensionRecord {
            id: id("foo.bar"),
            version: "1.0.0".to_string(),
            download_url: format!("{url}/x.vsix"),
            sha256_url: None,
        };

        let result = registry(&url).download(&record, &dir.path().join("x.vsix"));
        assert!(matches!(result, Err(ExtensionError::TransferFailed { .. })));
    }
}
