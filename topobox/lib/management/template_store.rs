use std::{
    io,
    path::{Path, PathBuf},
};

use crate::{
    config::Template,
    utils::{self, TEMPLATE_EXTENSION},
    TopoboxError, TopoboxResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A directory of YAML template definitions, one `<name>.yaml` file per template.
///
/// Resolving a template never modifies it. Templates are only ever added, never rewritten.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TemplateStore {
    /// Creates a store reading templates from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the directory the templates are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the definition file of a template.
    pub fn template_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{TEMPLATE_EXTENSION}"))
    }

    /// Loads and validates the template called `name`.
    ///
    /// Fails with [`TopoboxError::TemplateNotFound`] if there is no such template and with
    /// [`TopoboxError::TemplateInvalid`] if its definition is malformed or a node attaches to an
    /// undefined network.
    pub async fn resolve(&self, name: &str) -> TopoboxResult<Template> {
        if utils::validate_name(name).is_err() {
            return Err(TopoboxError::TemplateNotFound(name.to_string()));
        }

        let path = self.template_path(name);
        let yaml = match tokio::fs::read_to_string(&path).await {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TopoboxError::TemplateNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("resolved template {} from {}", name, path.display());
        Template::from_yaml(name, &yaml)
    }

    /// Returns `true` if a template called `name` is registered.
    pub async fn exists(&self, name: &str) -> TopoboxResult<bool> {
        if utils::validate_name(name).is_err() {
            return Ok(false);
        }

        Ok(tokio::fs::try_exists(self.template_path(name)).await?)
    }

    /// Returns every valid template, ordered by name.
    ///
    /// Files that fail to parse or validate are skipped and logged.
    pub async fn list(&self) -> TopoboxResult<Vec<Template>> {
        let mut names: Vec<String> = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }

            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();

        let mut templates = Vec::with_capacity(names.len());
        for name in names {
            match self.resolve(&name).await {
                Ok(template) => templates.push(template),
                Err(e) => tracing::warn!("skipping template {}: {}", name, e),
            }
        }

        Ok(templates)
    }

    /// Registers a new template.
    ///
    /// Fails with [`TopoboxError::TemplateAlreadyExists`] if the name is taken.
    pub async fn create(&self, template: &Template) -> TopoboxResult<()> {
        let name = template.get_name();
        utils::validate_name(name)?;
        template.validate()?;

        if self.exists(name).await? {
            return Err(TopoboxError::TemplateAlreadyExists(name.clone()));
        }

        let path = self.template_path(name);
        utils::write_atomic(&path, template.to_yaml()?.into_bytes()).await?;
        tracing::info!("created template {} at {}", name, path.display());

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::config::{NetworkDef, NodeDef};

    use super::*;

    fn t1() -> Template {
        Template::builder()
            .name("T1")
            .networks(vec![NetworkDef::builder()
                .name("net-a")
                .cidr("10.0.0.0/24".parse().unwrap())
                .build()])
            .nodes(vec![NodeDef::builder()
                .name("node-1")
                .services(["web".to_string()].into())
                .networks(vec!["net-a".to_string()])
                .build()])
            .build()
    }

    #[tokio::test]
    async fn test_template_store_create_and_resolve() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = TemplateStore::new(dir.path());

        assert!(!store.exists("T1").await?);
        store.create(&t1()).await?;
        assert!(store.exists("T1").await?);

        let resolved = store.resolve("T1").await?;
        assert_eq!(resolved, t1());

        assert!(matches!(
            store.create(&t1()).await,
            Err(TopoboxError::TemplateAlreadyExists(name)) if name == "T1"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_template_store_resolve_errors() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = TemplateStore::new(dir.path());

        assert!(matches!(
            store.resolve("missing").await,
            Err(TopoboxError::TemplateNotFound(name)) if name == "missing"
        ));
        assert!(matches!(
            store.resolve("../escape").await,
            Err(TopoboxError::TemplateNotFound(_))
        ));

        tokio::fs::write(
            store.template_path("broken"),
            "nodes:\n  - name: n\n    networks: [ghost]\n",
        )
        .await?;
        assert!(matches!(
            store.resolve("broken").await,
            Err(TopoboxError::TemplateInvalid { template, .. }) if template == "broken"
        ));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_template_store_list_skips_invalid() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = TemplateStore::new(dir.path());

        store.create(&t1()).await?;
        store
            .create(&Template::builder().name("A0").build())
            .await?;
        tokio::fs::write(store.template_path("broken"), "nodes: 42").await?;
        tokio::fs::write(dir.path().join("notes.txt"), "not a template").await?;

        let names: Vec<_> = store
            .list()
            .await?
            .iter()
            .map(|t| t.get_name().clone())
            .collect();
        assert_eq!(names, vec!["A0", "T1"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_template_store_list_missing_root() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = TemplateStore::new(dir.path().join("nope"));
        assert!(store.list().await?.is_empty());

        Ok(())
    }
}
