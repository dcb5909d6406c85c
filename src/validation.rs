use crate::error::AppError;

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub fn require_valid_id(field: &str, value: i64) -> Result<(), AppError> {
    if value <= 0 {
        return Err(AppError::Validation(format!("{field} must be a valid ID")));
    }
    Ok(())
}

/// The chatbot only checks for an `@`; the API does the real validation.
pub fn is_plausible_email(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value.contains('@')
}

pub fn require_email(field: &str, value: &str) -> Result<(), AppError> {
    if !is_plausible_email(value) {
        return Err(AppError::Validation(format!("{field} must be an email address")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("name", "Ada").is_ok());
        assert!(require_non_empty("name", "   ").is_err());
    }

    #[test]
    fn test_plausible_email() {
        assert!(is_plausible_email("ada@example.com"));
        assert!(is_plausible_email("  a@b "));
        assert!(!is_plausible_email("ada.example.com"));
        assert!(!is_plausible_email("   "));
    }

    #[test]
    fn test_require_valid_id() {
        assert!(require_valid_id("patient_id", 7).is_ok());
        assert!(require_valid_id("patient_id", 0).is_err());
    }
}
