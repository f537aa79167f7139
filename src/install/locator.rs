//! Where the reporter lives on disk.

use crate::install::platform::Platform;
use std::path::{Path, PathBuf};

/// Environment variable overriding the install directory.
pub const HOME_ENV_VAR: &str = "WAKATIME_HOME";

/// Base name of the reporter executable and its release artifacts.
pub const REPORTER_NAME: &str = "wakatime-cli";

/// Default directory name under the user's home.
const DEFAULT_DIR_NAME: &str = ".wakatime";

/// Resolve the install directory from the environment.
pub fn resolve_install_dir() -> PathBuf {
    install_dir_from(std::env::var(HOME_ENV_VAR).ok().as_deref(), dirs::home_dir())
}

/// Pick `override_dir` when it is non-blank, else `<home>/.wakatime`.
///
/// Falls back to the working directory when no home directory is known.
pub fn install_dir_from(override_dir: Option<&str>, home: Option<PathBuf>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => home
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME),
    }
}

/// File name of the reporter executable, e.g. `wakatime-cli-linux-amd64`.
pub fn binary_file_name(platform: &Platform) -> String {
    let suffix = if platform.is_windows() { ".exe" } else { "" };
    format!("{REPORTER_NAME}-{platform}{suffix}")
}

pub fn resolve_binary_path(install_dir: &Path, platform: &Platform) -> PathBuf {
    install_dir.join(binary_file_name(platform))
}

/// Install directory and reporter executable of one provisioned reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub install_dir: PathBuf,
    pub binary_path: PathBuf,
    pub platform: Platform,
}

impl Installation {
    pub fn new(install_dir: PathBuf, platform: Platform) -> Self {
        let binary_path = resolve_binary_path(&install_dir, &platform);
        Self {
            install_dir,
            binary_path,
            platform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins_when_not_blank() {
        let home = Some(PathBuf::from("/home/dev"));
        assert_eq!(
            install_dir_from(Some("/opt/waka"), home.clone()),
            PathBuf::from("/opt/waka")
        );
        assert_eq!(
            install_dir_from(Some("   "), home.clone()),
            PathBuf::from("/home/dev/.wakatime")
        );
        assert_eq!(install_dir_from(None, home), PathBuf::from("/home/dev/.wakatime"));
    }

    #[test]
    fn test_missing_home_uses_working_dir() {
        assert_eq!(install_dir_from(None, None), PathBuf::from("./.wakatime"));
    }

    #[test]
    fn test_binary_name_per_platform() {
        assert_eq!(
            binary_file_name(&Platform::new("linux", "amd64")),
            "wakatime-cli-linux-amd64"
        );
        assert_eq!(
            binary_file_name(&Platform::new("windows", "arm64")),
            "wakatime-cli-windows-arm64.exe"
        );
    }

    #[test]
    fn test_installation_paths() {
        let install = Installation::new(PathBuf::from("/w"), Platform::new("darwin", "arm64"));
        assert_eq!(install.binary_path, PathBuf::from("/w/wakatime-cli-darwin-arm64"));
    }
}
