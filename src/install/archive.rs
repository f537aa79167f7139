//! Safe extraction of the reporter's zip archive.
//!
//! Every entry name is resolved lexically against the destination before
//! anything is written. A single entry that would land outside the
//! destination (`../../evil`, `/etc/passwd`) fails the whole extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed zip archive: {0}")]
    Zip(#[from] ZipError),

    #[error("archive entry escapes the destination directory: {0}")]
    UnsafeEntry(String),
}

impl ArchiveError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Resolve an archive entry name to a path strictly inside `destination`.
///
/// Resolution is purely lexical, so it works before the destination exists.
pub fn resolve_entry_path(destination: &Path, entry_name: &str) -> Result<PathBuf, ArchiveError> {
    let unsafe_entry = || ArchiveError::UnsafeEntry(entry_name.to_string());
    let mut relative = PathBuf::new();

    for component in Path::new(entry_name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(unsafe_entry());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_entry()),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(unsafe_entry());
    }
    Ok(destination.join(relative))
}

/// Extract every entry of `archive` into `destination`, creating intermediate
/// directories. Returns the paths of the extracted files.
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let file = File::open(archive).map_err(|e| ArchiveError::io(archive, e))?;
    let mut zip = ZipArchive::new(file)?;

    let mut targets = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        targets.push(resolve_entry_path(destination, entry.name())?);
    }

    fs::create_dir_all(destination).map_err(|e| ArchiveError::io(destination, e))?;

    let mut extracted = Vec::new();
    for (index, target) in targets.into_iter().enumerate() {
        let mut entry = zip.by_index(index)?;

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| ArchiveError::io(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }

        let mut out = File::create(&target).map_err(|e| ArchiveError::io(&target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| ArchiveError::io(&target, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777))
                .map_err(|e| ArchiveError::io(&target, e))?;
        }

        debug!(path = %target.display(), "extracted");
        extracted.push(target);
    }

    Ok(extracted)
}
