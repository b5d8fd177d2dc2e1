//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects strings made only of whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("Kohli") // Ok
/// validate_not_blank("   ")   // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must contain non-whitespace characters".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects a pair of team ids that name the same team twice.
pub fn validate_distinct_teams(first: i64, second: i64) -> Result<(), ValidationError> {
    if first == second {
        let mut err = ValidationError::new("distinct_teams");
        err.message = Some(format!("team `{first}` cannot play against itself").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("A").is_ok());
        assert!(validate_not_blank(" padded ").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t\n").is_err());
    }

    #[test]
    fn test_validate_distinct_teams() {
        assert!(validate_distinct_teams(1, 2).is_ok());
        assert!(validate_distinct_teams(3, 3).is_err());
    }
}
