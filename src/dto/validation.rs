//! Validation helpers for DTOs.

use validator::ValidationError;

/// Minimum length of a team name once trimmed.
pub const TEAM_NAME_MIN_LEN: usize = 3;

/// Validates that a join code is a non-empty string of ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_join_code("4821") // Ok
/// validate_join_code("")     // Err - empty
/// validate_join_code("48a1") // Err - not a digit
/// ```
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() {
        let mut err = ValidationError::new("join_code_empty");
        err.message = Some("Join code is required".into());
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("join_code_format");
        err.message = Some("Join code must contain only digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a team name has at least [`TEAM_NAME_MIN_LEN`] characters once trimmed.
pub fn validate_team_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length < TEAM_NAME_MIN_LEN {
        let mut err = ValidationError::new("team_name_length");
        err.message = Some(
            format!("Team name must be at least {TEAM_NAME_MIN_LEN} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_join_code_valid() {
        assert!(validate_join_code("4821").is_ok());
        assert!(validate_join_code("0").is_ok());
    }

    #[test]
    fn test_validate_join_code_invalid() {
        assert!(validate_join_code("").is_err());
        assert!(validate_join_code("48a1").is_err());
        assert!(validate_join_code(" 4821").is_err());
        assert!(validate_join_code("-12").is_err());
    }

    #[test]
    fn test_validate_team_name() {
        assert!(validate_team_name("Quizzly Bears").is_ok());
        assert!(validate_team_name("abc").is_ok());
        assert!(validate_team_name("  ab  ").is_err());
        assert!(validate_team_name("").is_err());
    }
}
