//! Platform detection for picking the right reporter build.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `{os}-{arch}` pairs published by the reporter project.
pub const SUPPORTED_PLATFORMS: &[&str] = &[
    "darwin-amd64",
    "darwin-arm64",
    "freebsd-386",
    "freebsd-amd64",
    "freebsd-arm",
    "linux-386",
    "linux-amd64",
    "linux-arm",
    "linux-arm64",
    "netbsd-386",
    "netbsd-amd64",
    "netbsd-arm",
    "openbsd-386",
    "openbsd-amd64",
    "openbsd-arm",
    "openbsd-arm64",
    "windows-386",
    "windows-amd64",
    "windows-arm64",
];

/// Canonical OS and architecture names as used in reporter artifact names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("unsupported platform: {0}")]
    Unsupported(Platform),
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Normalise raw OS and architecture strings.
    pub fn from_raw(raw_os: &str, raw_arch: &str) -> Self {
        let os = normalize_os(raw_os);
        let arch = normalize_arch(raw_arch, &os);
        Self { os, arch }
    }

    /// The platform this process is running on.
    pub fn current() -> Self {
        Self::from_raw(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_PLATFORMS.contains(&self.to_string().as_str())
    }

    /// Fail unless this pair has a published reporter build.
    pub fn assert_supported(&self) -> Result<(), PlatformError> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(PlatformError::Unsupported(self.clone()))
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Map a raw OS name to `windows`, `darwin` or `linux`, otherwise return it
/// lowercased.
pub fn normalize_os(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if lower.contains("windows") {
        "windows".to_string()
    } else if lower.contains("mac") || lower.contains("darwin") {
        "darwin".to_string()
    } else if lower.contains("linux") {
        "linux".to_string()
    } else {
        lower
    }
}

/// Map a raw architecture name onto the reporter's naming.
///
/// Rules apply in order: 32-bit x86 → `386`, `aarch64` → `arm64`, any ARM on
/// darwin → `arm64`, anything else 64-bit → `amd64`.
pub fn normalize_arch(raw: &str, os: &str) -> String {
    let raw = raw.trim();
    if raw.contains("386") || raw.contains("32") || raw == "x86" || raw == "i686" {
        "386".to_string()
    } else if raw == "aarch64" {
        "arm64".to_string()
    } else if os == "darwin" && raw.contains("arm") {
        "arm64".to_string()
    } else if raw.contains("64") {
        "amd64".to_string()
    } else {
        raw.to_string()
    }
}
