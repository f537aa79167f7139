//! One-shot provisioning of the reporter executable.
//!
//! ```text
//! Idle → PlatformChecked → VersionResolved → Downloaded → Extracted → Installed
//!   └──────────┴────────────────┴────────────────┴──────────┴──→ Failed(kind)
//! ```
//!
//! Any failure before `Installed` is terminal for the session. Cleanup after
//! extraction (archive removal, executable bit) is best effort and only logged.

use crate::install::archive::{extract_archive, ArchiveError};
use crate::install::locator::{Installation, REPORTER_NAME};
use crate::install::platform::{Platform, PlatformError};
use crate::install::release::{ReleaseClient, ReleaseConfig, ReleaseError};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Why provisioning stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionFailure {
    UnsupportedPlatform,
    NoVersion,
    DownloadError,
    ExtractionError,
}

/// Progress of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionState {
    Idle,
    PlatformChecked,
    VersionResolved { version: String },
    Downloaded { version: String, archive: PathBuf },
    Extracted { version: String },
    Installed { version: String, installation: Installation },
    Failed(ProvisionFailure),
}

impl ProvisionState {
    pub fn is_installed(&self) -> bool {
        matches!(self, ProvisionState::Installed { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    UnsupportedPlatform(#[from] PlatformError),

    #[error("could not resolve the latest reporter version: {0}")]
    NoVersion(#[source] ReleaseError),

    #[error("reporter download failed: {0}")]
    Download(#[source] ReleaseError),

    #[error("reporter extraction failed: {0}")]
    Extraction(#[from] ArchiveError),
}

impl ProvisionError {
    pub fn failure(&self) -> ProvisionFailure {
        match self {
            ProvisionError::UnsupportedPlatform(_) => ProvisionFailure::UnsupportedPlatform,
            ProvisionError::NoVersion(_) => ProvisionFailure::NoVersion,
            ProvisionError::Download(_) => ProvisionFailure::DownloadError,
            ProvisionError::Extraction(_) => ProvisionFailure::ExtractionError,
        }
    }
}

/// Drives the provisioning state machine for one install directory.
pub struct Provisioner {
    release: ReleaseConfig,
    install_dir: PathBuf,
    platform: Platform,
    state: ProvisionState,
}

impl Provisioner {
    pub fn new(release: ReleaseConfig, install_dir: PathBuf, platform: Platform) -> Self {
        Self {
            release,
            install_dir,
            platform,
            state: ProvisionState::Idle,
        }
    }

    pub fn state(&self) -> &ProvisionState {
        &self.state
    }

    /// Run provisioning to completion on a private current-thread runtime.
    pub fn provision_blocking(&mut self) -> Result<Installation, ProvisionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                ProvisionError::NoVersion(ReleaseError::Client(format!(
                    "Failed to create runtime: {e}"
                )))
            });

        match runtime {
            Ok(runtime) => runtime.block_on(self.provision()),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Run provisioning to completion.
    pub async fn provision(&mut self) -> Result<Installation, ProvisionError> {
        self.transition(ProvisionState::Idle);
        let result = self.run_steps().await;
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    async fn run_steps(&mut self) -> Result<Installation, ProvisionError> {
        self.platform.assert_supported()?;
        self.transition(ProvisionState::PlatformChecked);

        let client = ReleaseClient::new(self.release.clone()).map_err(ProvisionError::NoVersion)?;
        let version = client
            .latest_version()
            .await
            .map_err(ProvisionError::NoVersion)?;
        info!(%version, platform = %self.platform, "latest reporter version resolved");
        self.transition(ProvisionState::VersionResolved {
            version: version.clone(),
        });

        tokio::fs::create_dir_all(&self.install_dir)
            .await
            .map_err(|source| {
                ProvisionError::Download(ReleaseError::Io {
                    path: self.install_dir.clone(),
                    source,
                })
            })?;
        let archive = self.install_dir.join(format!(
            "{REPORTER_NAME}-{version}-{}.zip",
            Uuid::new_v4().simple()
        ));
        let url = self.release.download_url(&version, &self.platform);
        client
            .download(&url, &archive)
            .await
            .map_err(ProvisionError::Download)?;
        self.transition(ProvisionState::Downloaded {
            version: version.clone(),
            archive: archive.clone(),
        });

        if let Err(e) = extract_archive(&archive, &self.install_dir) {
            remove_archive(&archive);
            return Err(e.into());
        }
        self.transition(ProvisionState::Extracted {
            version: version.clone(),
        });

        let installation = Installation::new(self.install_dir.clone(), self.platform.clone());
        remove_archive(&archive);
        if !self.platform.is_windows() {
            if let Err(e) = mark_executable(&installation.binary_path) {
                warn!(
                    path = %installation.binary_path.display(),
                    error = %e,
                    "could not mark reporter executable"
                );
            }
        }

        info!(path = %installation.binary_path.display(), "reporter installed");
        self.transition(ProvisionState::Installed {
            version,
            installation: installation.clone(),
        });
        Ok(installation)
    }

    fn fail(&mut self, e: &ProvisionError) {
        error!(error = %e, platform = %self.platform, "provisioning failed");
        self.transition(ProvisionState::Failed(e.failure()));
    }

    fn transition(&mut self, next: ProvisionState) {
        debug!(from = ?self.state, to = ?next, "provisioning state");
        self.state = next;
    }
}

fn remove_archive(archive: &Path) {
    if let Err(e) = std::fs::remove_file(archive) {
        warn!(path = %archive.display(), error = %e, "could not remove reporter archive");
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
