use std::{env, io, path::Path};

use getset::Getters;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    utils::{SETTINGS_FILENAME, TOPOBOX_PROVISIONER_ENV_VAR},
    TopoboxError, TopoboxResult,
};

use super::{DEFAULT_PROVISIONER_TIMEOUT_SECS, DEFAULT_SUBNET_POOL, DEFAULT_SUBNET_PREFIX};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Host-wide settings read from `settings.yaml` in the home directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Settings {
    /// The provisioner command: the executable followed by any leading arguments.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    #[builder(default)]
    provisioner: Vec<String>,

    /// The number of seconds a single provisioner call may take.
    #[serde(default = "Settings::default_provisioner_timeout_secs")]
    #[builder(default = Settings::default_provisioner_timeout_secs())]
    provisioner_timeout_secs: u64,

    /// The pool automatically allocated networks are carved from.
    #[serde(default = "Settings::default_subnet_pool")]
    #[builder(default = Settings::default_subnet_pool())]
    subnet_pool: Ipv4Network,

    /// The prefix length of an automatically allocated network.
    #[serde(default = "Settings::default_subnet_prefix")]
    #[builder(default = Settings::default_subnet_prefix())]
    subnet_prefix: u8,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Settings {
    /// Loads the settings of the given home directory, falling back to defaults when the file is
    /// absent.
    pub async fn load(home: impl AsRef<Path>) -> TopoboxResult<Self> {
        let path = home.as_ref().join(SETTINGS_FILENAME);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("no settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let settings: Settings = serde_yaml::from_str(&contents)?;
        if settings.subnet_prefix < settings.subnet_pool.prefix() || settings.subnet_prefix > 32 {
            return Err(TopoboxError::custom(anyhow::anyhow!(
                "subnet_prefix /{} cannot be carved from subnet_pool {}",
                settings.subnet_prefix,
                settings.subnet_pool
            )));
        }

        Ok(settings)
    }

    /// Returns the provisioner command to run, if any.
    ///
    /// `TOPOBOX_PROVISIONER` overrides the configured executable.
    pub fn provisioner_command(&self) -> Option<Vec<String>> {
        match env::var(TOPOBOX_PROVISIONER_ENV_VAR) {
            Ok(program) if !program.is_empty() => Some(vec![program]),
            _ if !self.provisioner.is_empty() => Some(self.provisioner.clone()),
            _ => None,
        }
    }

    fn default_provisioner_timeout_secs() -> u64 {
        DEFAULT_PROVISIONER_TIMEOUT_SECS
    }

    fn default_subnet_pool() -> Ipv4Network {
        *DEFAULT_SUBNET_POOL
    }

    fn default_subnet_prefix() -> u8 {
        DEFAULT_SUBNET_PREFIX
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for Settings {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[tokio::test]
    async fn test_settings_defaults_when_absent() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let settings = Settings::load(home.path()).await?;

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.get_subnet_pool().to_string(), "10.10.0.0/16");
        assert_eq!(*settings.get_subnet_prefix(), 28);
        assert_eq!(*settings.get_provisioner_timeout_secs(), 300);

        Ok(())
    }

    #[tokio::test]
    async fn test_settings_partial_file() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        tokio::fs::write(
            home.path().join(SETTINGS_FILENAME),
            "provisioner: [sh, /opt/prov.sh]\nsubnet_pool: 172.16.0.0/12\n",
        )
        .await?;

        let settings = Settings::load(home.path()).await?;
        assert_eq!(settings.get_provisioner(), &vec!["sh", "/opt/prov.sh"]);
        assert_eq!(settings.get_subnet_pool().to_string(), "172.16.0.0/12");
        assert_eq!(*settings.get_subnet_prefix(), 28);

        Ok(())
    }

    #[tokio::test]
    async fn test_settings_reject_prefix_wider_than_pool() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        tokio::fs::write(
            home.path().join(SETTINGS_FILENAME),
            "subnet_pool: 10.0.0.0/24\nsubnet_prefix: 16\n",
        )
        .await?;

        assert!(Settings::load(home.path()).await.is_err());

        Ok(())
    }

    #[test]
    #[serial]
    fn test_provisioner_env_override() {
        let settings = Settings::builder()
            .provisioner(vec!["/usr/bin/configured".to_string()])
            .build();

        env::remove_var(TOPOBOX_PROVISIONER_ENV_VAR);
        assert_eq!(
            settings.provisioner_command(),
            Some(vec!["/usr/bin/configured".to_string()])
        );
        assert_eq!(Settings::default().provisioner_command(), None);

        env::set_var(TOPOBOX_PROVISIONER_ENV_VAR, "/usr/bin/override");
        assert_eq!(
            settings.provisioner_command(),
            Some(vec!["/usr/bin/override".to_string()])
        );

        env::remove_var(TOPOBOX_PROVISIONER_ENV_VAR);
    }
}
