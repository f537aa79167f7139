//! Release index client for the reporter project.
//!
//! Resolves the latest published version and downloads release artifacts.

use crate::install::locator::REPORTER_NAME;
use crate::install::platform::Platform;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Release endpoints for the reporter project.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    /// API base serving the release index (default: https://api.github.com)
    pub api_base: String,
    /// Base serving release artifacts (default: https://github.com)
    pub download_base: String,
    /// `owner/name` of the reporter repository
    pub repository: String,
    /// Proxy for release traffic; empty means direct
    pub proxy: String,
    /// Optional outer limit on each request
    pub timeout: Option<Duration>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            download_base: "https://github.com".to_string(),
            repository: format!("wakatime/{REPORTER_NAME}"),
            proxy: String::new(),
            timeout: None,
        }
    }
}

impl ReleaseConfig {
    /// Point both the index and the downloads at one base URL.
    pub fn with_base(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            api_base: base.clone(),
            download_base: base,
            ..Self::default()
        }
    }

    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repository
        )
    }

    /// Artifact URL for `version` built for `platform`.
    pub fn download_url(&self, version: &str, platform: &Platform) -> String {
        format!(
            "{}/{}/releases/download/{}/{}-{}.zip",
            self.download_base.trim_end_matches('/'),
            self.repository,
            version,
            REPORTER_NAME,
            platform
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("release client setup failed: {0}")]
    Client(String),

    #[error("release request failed: {0}")]
    Network(String),

    #[error("release server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("release index has no usable tag_name: {0}")]
    InvalidTag(String),

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: serde_json::Value,
}

/// Extract the `tag_name` string from a release index document.
///
/// The tag ends up in a URL path and a file name, so only ASCII letters,
/// digits and `.`, `_`, `-`, `+` are accepted, and never `..`.
pub fn parse_tag_name(body: &str) -> Result<String, ReleaseError> {
    let release: LatestRelease =
        serde_json::from_str(body).map_err(|e| ReleaseError::InvalidTag(e.to_string()))?;

    match release.tag_name {
        serde_json::Value::String(tag) if is_safe_tag(&tag) => Ok(tag),
        other => Err(ReleaseError::InvalidTag(other.to_string())),
    }
}

fn is_safe_tag(tag: &str) -> bool {
    !tag.is_empty()
        && !tag.contains("..")
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
}

/// Async release client.
pub struct ReleaseClient {
    config: ReleaseConfig,
    client: reqwest::Client,
}

impl ReleaseClient {
    pub fn new(config: ReleaseConfig) -> Result<Self, ReleaseError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("wakatime-agent/{}", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if !config.proxy.trim().is_empty() {
            let proxy = reqwest::Proxy::all(config.proxy.trim())
                .map_err(|e| ReleaseError::Client(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ReleaseError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Ask the release index for the newest version tag.
    pub async fn latest_version(&self) -> Result<String, ReleaseError> {
        let url = self.config.latest_release_url();
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ReleaseError::Network(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), %url, "release index responded");
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ReleaseError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReleaseError::Network(e.to_string()))?;
        parse_tag_name(&body)
    }

    /// Stream `url` into `destination`. Returns the number of bytes written.
    ///
    /// A partially written file is removed on failure.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64, ReleaseError> {
        let result = self.download_inner(url, destination).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(destination).await;
        }
        result
    }

    async fn download_inner(&self, url: &str, destination: &Path) -> Result<u64, ReleaseError> {
        let io_error = |source| ReleaseError::Io {
            path: destination.to_path_buf(),
            source,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ReleaseError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReleaseError::Server {
                status: status.as_u16(),
                message: format!("download of {url} failed"),
            });
        }

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(io_error)?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ReleaseError::Network(e.to_string()))?
        {
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;

        debug!(bytes = written, path = %destination.display(), "download complete");
        Ok(written)
    }
}

/// Blocking release client for synchronous callers.
pub struct BlockingReleaseClient {
    inner: ReleaseClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingReleaseClient {
    pub fn new(config: ReleaseConfig) -> Result<Self, ReleaseError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ReleaseError::Client(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: ReleaseClient::new(config)?,
            runtime,
        })
    }

    pub fn latest_version(&self) -> Result<String, ReleaseError> {
        self.runtime.block_on(self.inner.latest_version())
    }

    pub fn download(&self, url: &str, destination: &Path) -> Result<u64, ReleaseError> {
        self.runtime.block_on(self.inner.download(url, destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let config = ReleaseConfig::default();
        assert_eq!(
            config.latest_release_url(),
            "https://api.github.com/repos/wakatime/wakatime-cli/releases/latest"
        );
        assert_eq!(
            config.download_url("v1.90.0", &Platform::new("linux", "amd64")),
            "https://github.com/wakatime/wakatime-cli/releases/download/v1.90.0/wakatime-cli-linux-amd64.zip"
        );
    }

    #[test]
    fn test_with_base_trims_trailing_slash() {
        let config = ReleaseConfig::with_base("http://127.0.0.1:9999/");
        assert_eq!(
            config.latest_release_url(),
            "http://127.0.0.1:9999/repos/wakatime/wakatime-cli/releases/latest"
        );
    }

    #[test]
    fn test_parse_tag_name() {
        assert_eq!(parse_tag_name(r#"{"tag_name":"v1.2.3","name":"x"}"#).unwrap(), "v1.2.3");
        assert!(matches!(
            parse_tag_name(r#"{"name":"x"}"#),
            Err(ReleaseError::InvalidTag(_))
        ));
        assert!(matches!(
            parse_tag_name(r#"{"tag_name":42}"#),
            Err(ReleaseError::InvalidTag(_))
        ));
        assert!(matches!(
            parse_tag_name(r#"{"tag_name":""}"#),
            Err(ReleaseError::InvalidTag(_))
        ));
        assert!(matches!(parse_tag_name("<html>"), Err(ReleaseError::InvalidTag(_))));
    }

    #[test]
    fn test_parse_tag_name_rejects_path_like_tags() {
        for tag in ["../../evil", "v1/../x", "v1.0/x", r"v1\x", "..", "v 1", "v1?x=1", " "] {
            let body = serde_json::json!({ "tag_name": tag }).to_string();
            assert!(
                matches!(parse_tag_name(&body), Err(ReleaseError::InvalidTag(_))),
                "accepted {tag:?}"
            );
        }
        assert_eq!(
            parse_tag_name(r#"{"tag_name":"v1.90.0-rc.1+build_2"}"#).unwrap(),
            "v1.90.0-rc.1+build_2"
        );
    }
}
