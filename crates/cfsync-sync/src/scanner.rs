//! Local tree scanner
//!
//! Walks a directory tree iteratively (explicit stack, no recursion) and
//! builds the local inventory: every regular, non-excluded file keyed by its
//! relative name, with an MD5 of its content.
//!
//! Entries that vanish or become unreadable mid-walk are logged and skipped;
//! a scan never fails as a whole. All functions here block and are meant to
//! run under `tokio::task::spawn_blocking`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use cfsync_core::domain::{
    entries::LocalEntry,
    errors::DomainError,
    newtypes::{ContentHash, RelativeName},
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::exclusion::ExclusionFilter;

/// Read buffer size used while hashing
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Local inventory: relative name → entry
pub type LocalInventory = HashMap<RelativeName, LocalEntry>;

/// Errors from stat-ing or hashing a single file
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error(transparent)]
    Name(#[from] DomainError),
}

/// Computes the MD5 of a file's content, reading in [`HASH_CHUNK_SIZE`] chunks
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(ContentHash::from_digest(context.compute().0))
}

/// Stats and hashes one file below `root`
///
/// Symlinks are followed; anything that does not resolve to a regular file is
/// rejected.
///
/// # Errors
/// Returns [`ScanError`] if the path is outside `root`, missing, not a
/// regular file, or unreadable
pub fn stat_local_file(root: &Path, path: &Path) -> Result<LocalEntry, ScanError> {
    let name = RelativeName::from_path(root, path)?;
    let metadata = std::fs::metadata(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(ScanError::NotAFile(path.to_path_buf()));
    }
    let hash = hash_file(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(LocalEntry {
        path: path.to_path_buf(),
        name,
        hash,
        size: metadata.len(),
        modified: metadata.modified().ok().map(DateTime::<Utc>::from),
    })
}

/// Scans every regular file below `start` (which must be `root` or inside it)
///
/// # Arguments
/// * `root` - The watched root; names are relative to it
/// * `start` - Directory to walk
/// * `filter` - Exclusion filter; excluded directories are not descended
///
/// # Returns
/// The inventory of hashed files. Unreadable entries are skipped.
pub fn scan_tree(root: &Path, start: &Path, filter: &ExclusionFilter) -> LocalInventory {
    let mut inventory = LocalInventory::new();
    walk(root, start, filter, |path, kind| {
        if kind != EntryKind::File {
            return;
        }
        match stat_local_file(root, path) {
            Ok(entry) => {
                inventory.insert(entry.name.clone(), entry);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable file"),
        }
    });
    debug!(start = %start.display(), files = inventory.len(), "Scan complete");
    inventory
}

/// Lists `start` and every non-excluded directory below it
///
/// Symlinked directories are not followed.
pub fn list_directories(root: &Path, start: &Path, filter: &ExclusionFilter) -> Vec<PathBuf> {
    let mut dirs = vec![start.to_path_buf()];
    walk(root, start, filter, |path, kind| {
        if kind == EntryKind::Dir {
            dirs.push(path.to_path_buf());
        }
    });
    dirs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
    Other,
}

fn walk<F>(root: &Path, start: &Path, filter: &ExclusionFilter, mut visit: F)
where
    F: FnMut(&Path, EntryKind),
{
    let mut stack = vec![start.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read directory");
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Cannot read directory entry");
                    continue;
                }
            };
            let path = entry.path();

            let name = match RelativeName::from_path(root, &path) {
                Ok(name) => name,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unrepresentable name");
                    continue;
                }
            };
            if filter.excludes(&path, name.as_str()) {
                debug!(name = %name, "Excluded");
                continue;
            }

            let kind = match entry.file_type() {
                Ok(ft) if ft.is_dir() => EntryKind::Dir,
                Ok(ft) if ft.is_file() => EntryKind::File,
                Ok(ft) if ft.is_symlink() => match std::fs::metadata(&path) {
                    Ok(meta) if meta.is_file() => EntryKind::File,
                    _ => EntryKind::Other,
                },
                Ok(_) => EntryKind::Other,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot determine file type");
                    continue;
                }
            };

            if kind == EntryKind::Dir {
                stack.push(path.clone());
            }
            visit(&path, kind);
        }
    }
}
