use crate::{TopoboxError, TopoboxResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The maximum length of a sandbox or template name.
pub const MAX_NAME_LEN: usize = 64;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Checks that a sandbox or template name can be used as a file stem.
///
/// Names are 1 to 64 characters of `[A-Za-z0-9._-]` and must not start with `.` or `-`.
pub fn validate_name(name: &str) -> TopoboxResult<()> {
    let reject = |reason: &str| {
        Err(TopoboxError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return reject("name cannot be empty");
    }

    if name.len() > MAX_NAME_LEN {
        return reject("name is longer than 64 characters");
    }

    if name.starts_with('.') || name.starts_with('-') {
        return reject("name cannot start with '.' or '-'");
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return reject(&format!("character {c:?} is not allowed"));
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("sb1").is_ok());
        assert!(validate_name("multi-one-control").is_ok());
        assert!(validate_name("a.b_c-d").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("-flag").is_err());
        assert!(validate_name("../escape").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name(&"x".repeat(65)).is_err());

        assert!(matches!(
            validate_name("a/b"),
            Err(TopoboxError::InvalidName { reason, .. }) if reason.contains("'/'")
        ));
    }
}
