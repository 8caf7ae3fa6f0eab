//! Topobox home directory management.
//!
//! The home directory holds everything topobox persists on a host: sandbox records, template
//! definitions, base images, lock files and the optional settings file.

use std::path::Path;

use tokio::fs;

use crate::{
    config::starter_templates,
    utils::{IMAGES_SUBDIR, LOCKS_SUBDIR, SANDBOXES_SUBDIR, TEMPLATES_SUBDIR},
    TopoboxError, TopoboxResult,
};

use super::TemplateStore;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Initializes a topobox home directory.
///
/// Creates the directory and its `sandboxes/`, `templates/`, `locks/` and `images/` sub
/// directories, and installs the starter templates that are not already present. Base images are
/// not built here; the operator drops them into `images/`. Running it again on an initialized
/// home changes nothing.
///
/// Returns the names of the templates that were installed.
///
/// ## Example
/// ```no_run
/// use topobox::management;
///
/// # async fn example() -> anyhow::Result<()> {
/// management::initialize("/tmp/topobox-home").await?;
/// # Ok(())
/// # }
/// ```
pub async fn initialize(home: impl AsRef<Path>) -> TopoboxResult<Vec<String>> {
    let home = home.as_ref();
    for subdir in [SANDBOXES_SUBDIR, TEMPLATES_SUBDIR, LOCKS_SUBDIR, IMAGES_SUBDIR] {
        fs::create_dir_all(home.join(subdir)).await?;
    }
    tracing::info!("home directory available at {}", home.display());

    let templates = TemplateStore::new(home.join(TEMPLATES_SUBDIR));
    let mut installed = Vec::new();
    for template in starter_templates() {
        if templates.exists(template.get_name()).await? {
            tracing::debug!("template {} already present", template.get_name());
            continue;
        }

        templates.create(&template).await?;
        installed.push(template.get_name().clone());
    }

    Ok(installed)
}

/// Checks that `home` is an existing, writable directory.
pub async fn ensure_home(home: impl AsRef<Path>) -> TopoboxResult<()> {
    let home = home.as_ref();
    let metadata = match fs::metadata(home).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TopoboxError::HomeNotFound(home.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_dir() {
        return Err(TopoboxError::HomeNotADirectory(home.to_path_buf()));
    }

    let dir = home.to_path_buf();
    let writable = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(".write-check-")
            .tempfile_in(&dir)
            .is_ok()
    })
    .await?;

    if !writable {
        return Err(TopoboxError::HomeNotWritable(home.to_path_buf()));
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_is_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let home = dir.path().join("home");

        let installed = initialize(&home).await?;
        assert_eq!(installed, vec!["all-in-one", "multi-one-control"]);
        for subdir in [SANDBOXES_SUBDIR, TEMPLATES_SUBDIR, LOCKS_SUBDIR, IMAGES_SUBDIR] {
            assert!(home.join(subdir).is_dir());
        }

        assert!(initialize(&home).await?.is_empty());

        let templates = TemplateStore::new(home.join(TEMPLATES_SUBDIR));
        let names: Vec<_> = templates
            .list()
            .await?
            .iter()
            .map(|t| t.get_name().clone())
            .collect();
        assert_eq!(names, vec!["all-in-one", "multi-one-control"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_home() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        ensure_home(dir.path()).await?;

        let missing = dir.path().join("missing");
        assert!(matches!(
            ensure_home(&missing).await,
            Err(TopoboxError::HomeNotFound(path)) if path == missing
        ));

        let file = dir.path().join("file");
        fs::write(&file, b"").await?;
        assert!(matches!(
            ensure_home(&file).await,
            Err(TopoboxError::HomeNotADirectory(_))
        ));

        Ok(())
    }
}
