use std::{
    io,
    path::{Path, PathBuf},
};

use crate::{
    models::Sandbox,
    utils::{self, LOCKS_SUBDIR, LOCK_EXTENSION, RECORD_EXTENSION, SANDBOXES_SUBDIR},
    TopoboxError, TopoboxResult,
};

use super::SandboxLock;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The persisted sandbox records of a home directory.
///
/// Every sandbox is one JSON file under `sandboxes/`, keyed by name. Records are replaced
/// atomically and removed durably, so a reader never observes a partial write and a completed
/// `save` or `remove` survives a crash.
#[derive(Debug, Clone)]
pub struct StateStore {
    sandboxes_dir: PathBuf,
    locks_dir: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl StateStore {
    /// Creates a store rooted at the given home directory.
    pub fn new(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref();
        Self {
            sandboxes_dir: home.join(SANDBOXES_SUBDIR),
            locks_dir: home.join(LOCKS_SUBDIR),
        }
    }

    /// Returns the directory holding the records.
    pub fn sandboxes_dir(&self) -> &Path {
        &self.sandboxes_dir
    }

    /// Returns the path of the record of a sandbox.
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.sandboxes_dir.join(format!("{name}.{RECORD_EXTENSION}"))
    }

    /// Returns the path of the lock file of a sandbox.
    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.locks_dir.join(format!("{name}.{LOCK_EXTENSION}"))
    }

    /// Returns `true` if a record for `name` is present, whatever its status or contents.
    pub async fn exists(&self, name: &str) -> TopoboxResult<bool> {
        Ok(tokio::fs::try_exists(self.record_path(name)).await?)
    }

    /// Loads the record of a sandbox.
    ///
    /// Fails with [`TopoboxError::SandboxNotFound`] if there is none and with
    /// [`TopoboxError::CorruptedRecord`] if it cannot be decoded.
    pub async fn load(&self, name: &str) -> TopoboxResult<Sandbox> {
        let data = match tokio::fs::read(self.record_path(name)).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TopoboxError::SandboxNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Sandbox::from_json(name, &data)
    }

    /// Atomically replaces the record of a sandbox.
    pub async fn save(&self, sandbox: &Sandbox) -> TopoboxResult<()> {
        let path = self.record_path(sandbox.get_name());
        utils::write_atomic(&path, sandbox.to_json()?).await?;
        tracing::trace!(
            "saved sandbox {} ({}) to {}",
            sandbox.get_name(),
            sandbox.get_status(),
            path.display()
        );

        Ok(())
    }

    /// Removes the record of a sandbox. Removing an absent record is not an error.
    ///
    /// Returns `true` if a record was removed.
    pub async fn remove(&self, name: &str) -> TopoboxResult<bool> {
        let removed = utils::remove_durable(self.record_path(name)).await?;
        if removed {
            tracing::debug!("removed record of sandbox {}", name);
        }

        Ok(removed)
    }

    /// Returns the names of every record present, ordered by name.
    pub async fn names(&self) -> TopoboxResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.sandboxes_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) if !stem.starts_with('.') => names.push(stem.to_string()),
                _ => continue,
            }
        }

        names.sort();
        Ok(names)
    }

    /// Returns every readable record, ordered by name.
    ///
    /// Corrupted records are skipped and logged. Records removed while enumerating are skipped.
    pub async fn list(&self) -> TopoboxResult<Vec<Sandbox>> {
        let names = self.names().await?;
        let mut sandboxes = Vec::with_capacity(names.len());
        for name in names {
            match self.load(&name).await {
                Ok(sandbox) => sandboxes.push(sandbox),
                Err(TopoboxError::SandboxNotFound(_)) => continue,
                Err(e @ TopoboxError::CorruptedRecord { .. }) => {
                    tracing::error!("skipping unreadable record: {}", e)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(sandboxes)
    }

    /// Takes the exclusive lock of a sandbox name, waiting for any current holder.
    pub async fn lock(&self, name: &str) -> TopoboxResult<SandboxLock> {
        SandboxLock::acquire(self.lock_path(name)).await
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::{config::Template, models::SandboxStatus};

    use super::*;

    fn sandbox(name: &str) -> Sandbox {
        let template = Template::from_yaml(
            "T1",
            "networks: [{name: net-a}]\nnodes: [{name: node-1, networks: [net-a]}]\n",
        )
        .unwrap();

        Sandbox::from_template(name, &template, &["10.0.0.0/24".parse().unwrap()])
    }

    #[tokio::test]
    async fn test_state_store_save_load_remove() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let store = StateStore::new(home.path());

        assert!(!store.exists("sb1").await?);
        assert!(matches!(
            store.load("sb1").await,
            Err(TopoboxError::SandboxNotFound(name)) if name == "sb1"
        ));

        let mut record = sandbox("sb1");
        store.save(&record).await?;
        assert!(store.exists("sb1").await?);
        assert_eq!(store.load("sb1").await?, record);

        record.set_status(SandboxStatus::Error);
        store.save(&record).await?;
        assert_eq!(*store.load("sb1").await?.get_status(), SandboxStatus::Error);

        assert!(store.remove("sb1").await?);
        assert!(!store.remove("sb1").await?);
        assert!(!store.exists("sb1").await?);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_state_store_list_is_ordered_and_skips_corrupted() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let store = StateStore::new(home.path());

        for name in ["sb2", "sb10", "sb1"] {
            store.save(&sandbox(name)).await?;
        }
        tokio::fs::write(store.record_path("bad"), b"{ not json").await?;
        tokio::fs::write(store.sandboxes_dir().join("stray.txt"), b"ignored").await?;

        assert_eq!(store.names().await?, vec!["bad", "sb1", "sb10", "sb2"]);

        let listed: Vec<_> = store
            .list()
            .await?
            .iter()
            .map(|s| s.get_name().clone())
            .collect();
        assert_eq!(listed, vec!["sb1", "sb10", "sb2"]);

        // A corrupted record still counts as present.
        assert!(store.exists("bad").await?);
        assert!(matches!(
            store.load("bad").await,
            Err(TopoboxError::CorruptedRecord { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_state_store_list_empty_home() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let store = StateStore::new(home.path());
        assert!(store.list().await?.is_empty());

        Ok(())
    }
}
