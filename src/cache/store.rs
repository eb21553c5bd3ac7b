// Durable filesystem primitives shared by the entry and search stores.
// Temp-file staging with atomic rename, directory creation, and best-effort cleanup.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::{Ctx7Error, Result};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create a directory and all parents (world-readable, owner-writable).
pub fn create_dir_all(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path)
}

/// A fully written temp file waiting to be renamed over its destination.
///
/// Dropping a `StagedFile` without calling [`StagedFile::commit`] removes the
/// temp file, so every error path leaves the destination untouched.
#[derive(Debug)]
pub struct StagedFile {
    tmp_path: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Write into a fresh temp file next to `dest` and sync it to disk.
    pub fn stage(dest: &Path, write: impl FnOnce(&mut File) -> Result<()>) -> Result<Self> {
        let tmp_path = unique_sibling(dest, "tmp")?;

        let mut file = open_new(&tmp_path)?;
        let staged = Self {
            tmp_path,
            dest: dest.to_path_buf(),
            committed: false,
        };

        write(&mut file)?;
        file.sync_all()?;

        Ok(staged)
    }

    /// Atomically move the staged file into place.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(err) = fs::remove_file(&self.tmp_path) {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(
                    path = %self.tmp_path.display(),
                    error = %err,
                    "failed to remove temporary file"
                );
            }
        }
    }
}

/// Stage raw bytes for `dest`.
pub fn stage_bytes(dest: &Path, bytes: &[u8]) -> Result<StagedFile> {
    StagedFile::stage(dest, |file| {
        file.write_all(bytes)?;
        Ok(())
    })
}

/// Stage a value as pretty-printed JSON for `dest`.
pub fn stage_json<T: Serialize + ?Sized>(dest: &Path, value: &T) -> Result<StagedFile> {
    StagedFile::stage(dest, |file| {
        serde_json::to_writer_pretty(&mut *file, value)?;
        file.write_all(b"\n")?;
        Ok(())
    })
}

/// Write a value as JSON atomically via temp file.
pub fn write_json<T: Serialize + ?Sized>(dest: &Path, value: &T) -> Result<()> {
    stage_json(dest, value)?.commit()
}

/// Size of a file in bytes, or zero if it cannot be stat'ed.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Remove `dir` only if it is empty. Errors are ignored.
pub fn remove_dir_if_empty(dir: &Path) -> bool {
    let is_empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => return false,
    };
    if !is_empty {
        return false;
    }
    match fs::remove_dir(dir) {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "failed to remove empty directory");
            false
        }
    }
}

/// A copy of a live file, kept until the write that replaces it has fully committed.
///
/// [`Backup::restore`] puts the saved file back (or removes the new one when
/// nothing existed before). Dropping the backup discards it.
#[derive(Debug)]
pub struct Backup {
    saved: Option<PathBuf>,
}

impl Backup {
    /// Save `path` if it exists. A hard link is tried first, then a copy.
    pub fn of(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self { saved: None });
        }

        let saved = unique_sibling(path, "bak")?;
        if fs::hard_link(path, &saved).is_err() {
            fs::copy(path, &saved)?;
        }
        Ok(Self { saved: Some(saved) })
    }

    /// Put the saved file back at `path`, undoing a later commit.
    pub fn restore(mut self, path: &Path) {
        let result = match self.saved.take() {
            Some(saved) => fs::rename(&saved, path),
            None => fs::remove_file(path),
        };
        if let Err(err) = result {
            tracing::warn!(path = %path.display(), error = %err, "failed to restore previous file");
        }
    }
}

impl Drop for Backup {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(err) = fs::remove_file(&saved) {
                tracing::debug!(path = %saved.display(), error = %err, "failed to remove backup file");
            }
        }
    }
}

/// `.<name>.<pid>.<counter>.<ext>` next to `dest`.
fn unique_sibling(dest: &Path, ext: &str) -> Result<PathBuf> {
    let parent = dest
        .parent()
        .ok_or_else(|| Ctx7Error::Other(format!("{} has no parent", dest.display())))?;
    let file_name = dest
        .file_name()
        .ok_or_else(|| Ctx7Error::Other(format!("{} has no file name", dest.display())))?;

    Ok(parent.join(format!(
        ".{}.{}.{}.{}",
        file_name.to_string_lossy(),
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed),
        ext
    )))
}

fn open_new(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options.open(path)
}
