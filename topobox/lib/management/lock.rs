use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use fs4::FileExt;

use crate::TopoboxResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An exclusive advisory lock on a single sandbox name.
///
/// The lock is held for as long as the guard lives and released when it is dropped, whichever
/// way the holding operation exits. Locks are taken per open file, so two guards on the same
/// path exclude each other even inside one process.
///
/// A holder may unlink the lock file with [`SandboxLock::remove`]. Anyone who was waiting on the
/// unlinked file notices after locking it and starts over on a fresh file, so at most one guard
/// per path is ever live.
#[derive(Debug)]
pub struct SandboxLock {
    path: PathBuf,
    file: File,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandboxLock {
    /// Waits until the lock file at `path` can be locked exclusively.
    pub async fn acquire(path: impl AsRef<Path>) -> TopoboxResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = tokio::task::spawn_blocking(move || -> io::Result<Self> {
            loop {
                let file = open_lock_file(&path)?;
                file.lock_exclusive()?;
                if is_current(&file, &path)? {
                    return Ok(Self { path, file });
                }

                tracing::trace!("lock file {} was replaced, retrying", path.display());
            }
        })
        .await??;

        tracing::trace!("acquired lock {}", lock.path.display());
        Ok(lock)
    }

    /// Tries to take the lock without waiting. Returns `None` if someone else holds it.
    pub async fn try_acquire(path: impl AsRef<Path>) -> TopoboxResult<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        let lock = tokio::task::spawn_blocking(move || -> io::Result<Option<Self>> {
            loop {
                let file = open_lock_file(&path)?;
                match file.try_lock_exclusive() {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                    Err(e) => return Err(e),
                }

                if is_current(&file, &path)? {
                    return Ok(Some(Self { path, file }));
                }
            }
        })
        .await??;

        Ok(lock)
    }

    /// Returns the path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlinks the lock file, then releases the lock.
    ///
    /// Used once the sandbox the lock guards is gone, so `locks/` does not keep one file per
    /// name ever used.
    pub async fn remove(self) -> TopoboxResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::trace!("removed lock file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
}

/// Returns `true` if `file` is still the file linked at `path`.
#[cfg(unix)]
fn is_current(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match std::fs::metadata(path) {
        Ok(linked) => Ok(held.dev() == linked.dev() && held.ino() == linked.ino()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn is_current(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for SandboxLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release lock {}: {}", self.path.display(), e);
        } else {
            tracing::trace!("released lock {}", self.path.display());
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
