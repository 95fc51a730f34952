//! Filesystem-backed static file manager.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::StorageError;
use crate::normalize::format_content_directory;

/// Archive suffix stripped when mapping an archive name to a directory.
const ARCHIVE_SUFFIX: &str = ".zip";

/// Resource fork folder added by macOS archivers; never part of a site.
const MACOS_METADATA_DIR: &str = "__MACOSX";

/// Map an archive or project name to its directory name.
///
/// Takes the last path component of `name` and strips a trailing `.zip`.
/// Returns `None` when nothing usable is left (empty, `.`, `..`).
#[must_use]
pub fn directory_name(name: &str) -> Option<String> {
    let base = match Path::new(name).components().next_back()? {
        Component::Normal(base) => base.to_str()?,
        _ => return None,
    };
    let stem = base.strip_suffix(ARCHIVE_SUFFIX).unwrap_or(base);

    if stem.is_empty() || stem == "." || stem == ".." {
        return None;
    }
    Some(stem.to_owned())
}

/// Manages one directory per project under a static root.
///
/// Cheap to clone; holds only the root path. Each call fully owns its
/// destination subtree for the duration of the call. Nothing here prevents two
/// concurrent uploads to the same name from interleaving their writes.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    /// Open a static root, creating it if absent.
    ///
    /// Relative roots are resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the root cannot be resolved or created.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let root = std::path::absolute(root).map_err(|e| StorageError::io(root, &e))?;

        fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, &e))?;
        info!(root = %root.display(), "static root ready");

        Ok(Self { root })
    }

    /// The static root shared with the doc-serving layer.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.root
    }

    /// Directory that holds the content for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if `name` does not map to a
    /// directory name (see [`directory_name`]).
    pub fn destination(&self, name: &str) -> Result<PathBuf, StorageError> {
        let dir = directory_name(name).ok_or_else(|| StorageError::InvalidName {
            name: name.to_owned(),
            reason: "name has no usable final path component".to_owned(),
        })?;
        Ok(self.root.join(dir))
    }

    /// Unpack `archive` into the destination for `name`, replacing any
    /// previous content, then normalize the result.
    ///
    /// The archive is opened before anything is deleted, so an unreadable
    /// upload leaves the previous content in place. Once extraction starts a
    /// failure leaves a partially written destination behind; [`remove`]
    /// is the recovery tool.
    ///
    /// `size_hint` is the length the caller declared for the payload. A
    /// mismatch with the actual stream length is logged, not rejected.
    ///
    /// [`remove`]: StaticFiles::remove
    ///
    /// # Errors
    ///
    /// - [`StorageError::InvalidName`] if `name` has no usable directory name.
    /// - [`StorageError::Archive`] if the archive is malformed or an entry
    ///   would escape the destination.
    /// - [`StorageError::Io`] if writing to disk fails.
    pub fn upload<R: Read + Seek>(
        &self,
        mut archive: R,
        name: &str,
        size_hint: u64,
    ) -> Result<PathBuf, StorageError> {
        let dest = self.destination(name)?;
        let archive_err = |reason: String| StorageError::Archive {
            name: name.to_owned(),
            reason,
        };

        let actual = archive
            .seek(SeekFrom::End(0))
            .map_err(|e| archive_err(e.to_string()))?;
        if actual != size_hint {
            warn!(name, size_hint, actual, "archive length differs from declared size");
        }
        archive.rewind().map_err(|e| archive_err(e.to_string()))?;

        let mut zip = zip::ZipArchive::new(archive).map_err(|e| archive_err(e.to_string()))?;

        remove_dir_if_exists(&dest)?;
        fs::create_dir_all(&dest).map_err(|e| StorageError::io(&dest, &e))?;

        let mut written = 0usize;
        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| archive_err(e.to_string()))?;

            let relative = entry.enclosed_name().ok_or_else(|| {
                archive_err(format!("entry '{}' escapes the destination", entry.name()))
            })?;
            if relative.starts_with(MACOS_METADATA_DIR) {
                continue;
            }

            let path = dest.join(&relative);
            if entry.is_dir() {
                fs::create_dir_all(&path).map_err(|e| StorageError::io(&path, &e))?;
                continue;
            }

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, &e))?;
            }
            write_entry(&mut entry, &path)?;
            apply_mode(&path, entry.unix_mode())?;
            written = written.saturating_add(1);
        }

        let collapsed = format_content_directory(&dest)?;
        info!(
            name,
            dest = %dest.display(),
            files = written,
            collapsed,
            "archive extracted"
        );

        Ok(dest)
    }

    /// Recursively delete the destination for `name`.
    ///
    /// Idempotent: removing a directory that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] for unusable names and
    /// [`StorageError::Io`] if deletion fails.
    pub fn remove(&self, name: &str) -> Result<(), StorageError> {
        let dest = self.destination(name)?;
        remove_dir_if_exists(&dest)?;
        debug!(name, dest = %dest.display(), "artifact removed");
        Ok(())
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), StorageError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, &e)),
    }
}

fn write_entry(entry: &mut impl Read, path: &Path) -> Result<(), StorageError> {
    let mut file = File::create(path).map_err(|e| StorageError::io(path, &e))?;
    io::copy(entry, &mut file).map_err(|e| StorageError::io(path, &e))?;
    Ok(())
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode.map(|m| m & 0o777).filter(|m| *m != 0) else {
        return Ok(());
    };
    // Owner read is always kept so the file stays servable.
    let perms = fs::Permissions::from_mode(mode | 0o400);
    fs::set_permissions(path, perms).map_err(|e| StorageError::io(path, &e))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> Result<(), StorageError> {
    Ok(())
}
