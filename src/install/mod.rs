//! Reporter installation: platform detection, release lookup, download and
//! safe extraction.

pub mod archive;
pub mod locator;
pub mod platform;
pub mod provisioner;
pub mod release;

pub use archive::{extract_archive, resolve_entry_path, ArchiveError};
pub use locator::{
    binary_file_name, resolve_binary_path, resolve_install_dir, Installation, HOME_ENV_VAR,
    REPORTER_NAME,
};
pub use platform::{Platform, PlatformError, SUPPORTED_PLATFORMS};
pub use provisioner::{ProvisionError, ProvisionFailure, ProvisionState, Provisioner};
pub use release::{BlockingReleaseClient, ReleaseClient, ReleaseConfig, ReleaseError};
