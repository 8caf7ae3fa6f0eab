use typed_builder::TypedBuilder;

use crate::{
    models::{Sandbox, SandboxStatus},
    utils, TopoboxResult,
};

use super::StateStore;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Read-only enumeration of the sandboxes known to a [`StateStore`].
#[derive(Debug, Clone)]
pub struct SandboxRegistry {
    state: StateStore,
}

/// Narrows the sandboxes returned by [`SandboxRegistry::list`]. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct SandboxFilter {
    /// Only sandboxes in this status.
    #[builder(default, setter(strip_option))]
    pub status: Option<SandboxStatus>,

    /// Only sandboxes instantiated from this template.
    #[builder(default, setter(strip_option, into))]
    pub template: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandboxRegistry {
    /// Creates a registry over the given state store.
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    /// Lists the sandboxes matching `filter`, ordered by name.
    pub async fn list(&self, filter: &SandboxFilter) -> TopoboxResult<Vec<Sandbox>> {
        let sandboxes = self.state.list().await?;
        Ok(sandboxes
            .into_iter()
            .filter(|sandbox| filter.matches(sandbox))
            .collect())
    }

    /// Returns the record of a single sandbox.
    pub async fn show(&self, name: &str) -> TopoboxResult<Sandbox> {
        utils::validate_name(name)?;
        self.state.load(name).await
    }
}

impl SandboxFilter {
    /// Returns `true` if the sandbox passes the filter.
    pub fn matches(&self, sandbox: &Sandbox) -> bool {
        self.status
            .is_none_or(|status| status == *sandbox.get_status())
            && self
                .template
                .as_ref()
                .is_none_or(|template| template == sandbox.get_template())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::{config::Template, TopoboxError};

    use super::*;

    async fn seed(state: &StateStore) -> anyhow::Result<()> {
        let t1 = Template::from_yaml("T1", "networks: [{name: net-a}]\n")?;
        let t2 = Template::from_yaml("T2", "nodes: [{name: node-1}]\n")?;
        let cidr = "10.0.0.0/24".parse()?;

        let mut sb1 = Sandbox::from_template("sb1", &t1, &[cidr]);
        sb1.set_status(SandboxStatus::Active);
        state.save(&sb1).await?;

        let mut sb2 = Sandbox::from_template("sb2", &t2, &[]);
        sb2.set_status(SandboxStatus::Stopped);
        state.save(&sb2).await?;

        let mut sb3 = Sandbox::from_template("sb3", &t1, &[cidr]);
        sb3.set_status(SandboxStatus::Error);
        state.save(&sb3).await?;

        Ok(())
    }

    fn names(sandboxes: &[Sandbox]) -> Vec<&str> {
        sandboxes.iter().map(|s| s.get_name().as_str()).collect()
    }

    #[tokio::test]
    async fn test_registry_list_filters() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let state = StateStore::new(home.path());
        seed(&state).await?;
        let registry = SandboxRegistry::new(state);

        let all = registry.list(&SandboxFilter::default()).await?;
        assert_eq!(names(&all), vec!["sb1", "sb2", "sb3"]);

        let from_t1 = registry
            .list(&SandboxFilter::builder().template("T1").build())
            .await?;
        assert_eq!(names(&from_t1), vec!["sb1", "sb3"]);

        let active_t1 = registry
            .list(
                &SandboxFilter::builder()
                    .template("T1")
                    .status(SandboxStatus::Active)
                    .build(),
            )
            .await?;
        assert_eq!(names(&active_t1), vec!["sb1"]);

        let deleting = registry
            .list(&SandboxFilter::builder().status(SandboxStatus::Deleting).build())
            .await?;
        assert!(deleting.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_registry_show() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let state = StateStore::new(home.path());
        seed(&state).await?;
        let registry = SandboxRegistry::new(state);

        assert_eq!(*registry.show("sb2").await?.get_status(), SandboxStatus::Stopped);
        assert!(matches!(
            registry.show("ghost").await,
            Err(TopoboxError::SandboxNotFound(_))
        ));
        assert!(matches!(
            registry.show("../sb1").await,
            Err(TopoboxError::InvalidName { .. })
        ));

        Ok(())
    }
}
