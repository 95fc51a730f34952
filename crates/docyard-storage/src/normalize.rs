//! Directory normalization after extraction.
//!
//! Site archives are frequently built by zipping a folder, so the real content
//! sits one or more levels below the extraction root
//! (`docs/site/html/index.html`). The normalization pass finds the first level
//! that holds something other than a single directory and makes that level the
//! new root, removing the whole wrapper chain.
//!
//! [`content_root`] is a read-only query over directory listings;
//! [`format_content_directory`] is the only function that mutates the tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::StorageError;

/// Find the directory that holds the actual site content under `root`.
///
/// Descends while the current directory contains exactly one entry and that
/// entry is a directory. Returns `root` itself when no descent is possible.
///
/// # Errors
///
/// Returns [`StorageError::Io`] if a directory cannot be listed.
pub fn content_root(root: &Path) -> Result<PathBuf, StorageError> {
    let mut current = root.to_path_buf();

    loop {
        let mut entries = fs::read_dir(&current).map_err(|e| StorageError::io(&current, &e))?;

        let Some(first) = entries.next() else {
            break;
        };
        let first = first.map_err(|e| StorageError::io(&current, &e))?;

        if entries.next().is_some() {
            break;
        }

        let file_type = first
            .file_type()
            .map_err(|e| StorageError::io(&first.path(), &e))?;
        if !file_type.is_dir() {
            break;
        }

        current = first.path();
    }

    Ok(current)
}

/// Collapse redundant single-directory nesting under `root`.
///
/// Returns `true` if the tree was rewritten, `false` if `root` already held
/// the content. Running this on an already normalized directory is a no-op.
///
/// The content directory is first renamed to a hidden staging sibling of
/// `root`, then `root` (now holding only the empty wrapper chain) is removed
/// and the staging directory takes its place. Going through a sibling keeps
/// inner entries that share a wrapper's name from colliding.
///
/// # Errors
///
/// Returns [`StorageError::Io`] if listing, renaming, or removal fails. On a
/// failure after the first rename the content is left in the staging
/// directory, which is reported in the error path.
pub fn format_content_directory(root: &Path) -> Result<bool, StorageError> {
    let inner = content_root(root)?;
    if inner == root {
        return Ok(false);
    }

    let staging = staging_path(root)?;
    debug!(
        root = %root.display(),
        inner = %inner.display(),
        "collapsing nested content directory"
    );

    fs::rename(&inner, &staging).map_err(|e| StorageError::io(&inner, &e))?;
    fs::remove_dir_all(root).map_err(|e| StorageError::io(&staging, &e))?;
    fs::rename(&staging, root).map_err(|e| StorageError::io(&staging, &e))?;

    Ok(true)
}

fn staging_path(root: &Path) -> Result<PathBuf, StorageError> {
    let invalid = || StorageError::InvalidName {
        name: root.display().to_string(),
        reason: "content directory has no parent".to_owned(),
    };

    let parent = root.parent().ok_or_else(invalid)?;
    let name = root.file_name().ok_or_else(invalid)?;

    Ok(parent.join(format!(
        ".{}.staging-{}",
        name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn flat_directory_is_its_own_content_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("site");
        touch(&root.join("index.html"));
        touch(&root.join("style.css"));

        assert_eq!(content_root(&root).unwrap(), root);
        assert!(!format_content_directory(&root).unwrap());
        assert_eq!(entries(&root), vec!["index.html", "style.css"]);
    }

    #[test]
    fn single_file_stops_descent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("site");
        touch(&root.join("index.html"));

        assert_eq!(content_root(&root).unwrap(), root);
    }

    #[test]
    fn empty_directory_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("site");
        fs::create_dir_all(&root).unwrap();

        assert!(!format_content_directory(&root).unwrap());
        assert!(entries(&root).is_empty());
    }

    #[test]
    fn three_wrapper_levels_are_collapsed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("site");
        let inner = root.join("a").join("b").join("c");
        touch(&inner.join("index.html"));
        touch(&inner.join("_static").join("app.js"));

        assert_eq!(content_root(&root).unwrap(), inner);
        assert!(format_content_directory(&root).unwrap());

        assert_eq!(entries(&root), vec!["_static", "index.html"]);
        assert!(root.join("_static").join("app.js").is_file());
        // No staging leftovers next to the root.
        assert_eq!(entries(tmp.path()), vec!["site"]);
    }

    #[test]
    fn second_pass_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("site");
        touch(&root.join("wrap").join("index.html"));
        touch(&root.join("wrap").join("genindex.html"));

        assert!(format_content_directory(&root).unwrap());
        let after_first = entries(&root);
        assert!(!format_content_directory(&root).unwrap());
        assert_eq!(entries(&root), after_first);
    }

    #[test]
    fn inner_entry_named_like_wrapper_survives() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("site");
        touch(&root.join("docs").join("docs").join("page.html"));
        touch(&root.join("docs").join("index.html"));

        assert!(format_content_directory(&root).unwrap());
        assert_eq!(entries(&root), vec!["docs", "index.html"]);
        assert!(root.join("docs").join("page.html").is_file());
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = content_root(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
