use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::TopoboxResult;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Atomically replaces the file at `path` with `contents`.
///
/// The data is written to a temporary file in the same directory, flushed to disk, and renamed
/// over the target. The parent directory is synced afterwards so the rename itself is durable.
/// Readers either see the old file or the new one, never a partial write.
pub async fn write_atomic(path: impl AsRef<Path>, contents: Vec<u8>) -> TopoboxResult<()> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &contents)).await??;
    Ok(())
}

/// Removes the file at `path` if it exists and syncs its parent directory.
///
/// Returns `true` if a file was removed, `false` if it was already absent.
pub async fn remove_durable(path: impl AsRef<Path>) -> TopoboxResult<bool> {
    let path = path.as_ref().to_path_buf();
    let removed = match tokio::fs::remove_file(&path).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };

    if removed {
        let parent = parent_dir(&path);
        tokio::task::spawn_blocking(move || sync_dir(&parent)).await??;
    }

    Ok(removed)
}

fn write_atomic_blocking(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = parent_dir(path);
    std::fs::create_dir_all(&parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(&parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    persist(temp, path)?;

    sync_dir(&parent)
}

fn persist(temp: NamedTempFile, path: &Path) -> io::Result<()> {
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_replaces_contents() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("record.json");

        write_atomic(&path, b"first".to_vec()).await?;
        write_atomic(&path, b"second".to_vec()).await?;

        assert_eq!(tokio::fs::read_to_string(&path).await?, "second");

        // No temporary files are left behind.
        let mut entries = std::fs::read_dir(path.parent().unwrap())?;
        assert_eq!(entries.next().unwrap()?.file_name(), "record.json");
        assert!(entries.next().is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_durable_is_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("record.json");
        write_atomic(&path, b"{}".to_vec()).await?;

        assert!(remove_durable(&path).await?);
        assert!(!remove_durable(&path).await?);
        assert!(!path.exists());

        Ok(())
    }
}
