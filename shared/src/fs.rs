//! Filesystem helpers shared across the export tools.
//!
//! Exported assets are never written in place. Each file is first written to a
//! temporary sibling and only renamed over its destination once every file of
//! the unit has been staged, see [`StagedWrite`].

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Maximum allowed scene snapshot size for reading into memory.
pub const MAX_SCENE_BYTES: u64 = 512 * 1024 * 1024; // 512 MiB
/// Maximum allowed settings file size.
pub const MAX_SETTINGS_BYTES: u64 = 1024 * 1024; // 1 MiB
/// Maximum allowed size for a single source texture or exported asset.
pub const MAX_ASSET_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Read a file into memory with a size cap.
pub fn read_file_with_limit(path: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;
    let len = metadata.len();
    if len > max_bytes {
        anyhow::bail!(
            "File too large: {} ({} bytes, max {} bytes)",
            path.display(),
            len,
            max_bytes
        );
    }
    std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Create a directory and its parents if absent.
///
/// Concurrent callers racing on the same path all succeed.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Files staged for one all-or-nothing write.
///
/// Dropping a `StagedWrite` without calling [`commit`](Self::commit) removes
/// every temporary file and leaves the destinations untouched.
#[derive(Default)]
pub struct StagedWrite {
    staged: Vec<(PathBuf, NamedTempFile)>,
}

impl StagedWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `bytes` to a temporary file next to `path`.
    pub fn stage(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".bw-stage-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
        temp.write_all(bytes)
            .and_then(|_| temp.as_file().sync_all())
            .with_context(|| format!("Failed to stage {}", path.display()))?;

        self.staged.push((path.to_path_buf(), temp));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Rename every staged file into place.
    ///
    /// If any rename fails, the destinations already replaced in this commit
    /// are restored to their previous contents (or removed if they did not
    /// exist) before the error is returned.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut placed: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(self.staged.len());

        for (path, temp) in self.staged {
            let previous = match std::fs::read(&path) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    rollback(&placed);
                    return Err(e).with_context(|| format!("Failed to read {}", path.display()));
                }
            };

            if let Err(e) = temp.persist(&path) {
                rollback(&placed);
                return Err(e.error).with_context(|| format!("Failed to write {}", path.display()));
            }
            placed.push((path, previous));
        }

        Ok(placed.into_iter().map(|(path, _)| path).collect())
    }
}

fn rollback(placed: &[(PathBuf, Option<Vec<u8>>)]) {
    for (path, previous) in placed.iter().rev() {
        let restored = match previous {
            Some(bytes) => write_atomic(path, bytes),
            None => std::fs::remove_file(path).map_err(anyhow::Error::from),
        };
        if let Err(e) = restored {
            tracing::warn!("Failed to roll back {}: {:#}", path.display(), e);
        }
    }
}

/// Write a single file through a temporary sibling.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut staged = StagedWrite::new();
    staged.stage(path, bytes)?;
    staged.commit()?;
    Ok(())
}
