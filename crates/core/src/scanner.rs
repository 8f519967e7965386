//! Local publish directory scanner

use crate::error::{Error, Result};
use crate::path::object_key;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A regular file under the publish root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalEntry {
    /// Object key: path relative to the root, `/`-separated
    pub key: String,
    pub absolute_path: PathBuf,
    pub size: u64,
}

/// Lazily enumerate the files below `root`.
///
/// Symbolic links are neither followed nor reported, and special files
/// (sockets, fifos, devices) are skipped. Entries come out sorted by file
/// name within each directory.
pub fn scan_iter(root: &Path) -> Result<impl Iterator<Item = Result<LocalEntry>>> {
    let metadata = std::fs::metadata(root).map_err(|e| Error::Scan {
        path: root.to_path_buf(),
        message: e.to_string(),
    })?;
    if !metadata.is_dir() {
        return Err(Error::Scan {
            path: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let root = root.to_path_buf();
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    Ok(walker.filter_map(move |item| {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                return Some(Err(Error::Scan {
                    path,
                    message: e.to_string(),
                }));
            }
        };

        if !entry.file_type().is_file() {
            return None;
        }

        let relative = entry.path().strip_prefix(&root).ok()?;
        let Some(key) = object_key(relative) else {
            warn!(path = %entry.path().display(), "Skipping file with non UTF-8 name");
            return None;
        };

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                return Some(Err(Error::Scan {
                    path: entry.path().to_path_buf(),
                    message: e.to_string(),
                }))
            }
        };

        debug!(key = %key, size, "Found local file");
        Some(Ok(LocalEntry {
            key,
            absolute_path: entry.into_path(),
            size,
        }))
    }))
}

/// Collect every file below `root`.
pub fn scan(root: &Path) -> Result<Vec<LocalEntry>> {
    scan_iter(root)?.collect()
}
