use std::{env, path::PathBuf};

use crate::config::DEFAULT_TOPOBOX_HOME;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable overriding the home directory.
pub const TOPOBOX_HOME_ENV_VAR: &str = "TOPOBOX_HOME";

/// Environment variable overriding the provisioner executable.
pub const TOPOBOX_PROVISIONER_ENV_VAR: &str = "TOPOBOX_PROVISIONER";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolves the home directory.
///
/// An explicit path wins, then `TOPOBOX_HOME`, then `~/.topobox`.
pub fn resolve_home(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    match env::var_os(TOPOBOX_HOME_ENV_VAR) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => {
            tracing::debug!(
                "{} is not set, using default: {}",
                TOPOBOX_HOME_ENV_VAR,
                DEFAULT_TOPOBOX_HOME.display()
            );
            DEFAULT_TOPOBOX_HOME.clone()
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_resolve_home_precedence() {
        env::set_var(TOPOBOX_HOME_ENV_VAR, "/from/env");
        assert_eq!(
            resolve_home(Some(PathBuf::from("/explicit"))),
            PathBuf::from("/explicit")
        );
        assert_eq!(resolve_home(None), PathBuf::from("/from/env"));

        env::remove_var(TOPOBOX_HOME_ENV_VAR);
        assert_eq!(resolve_home(None), *DEFAULT_TOPOBOX_HOME);
    }
}
