//! Common validation utilities.

use validator::ValidationError;

/// Maximum length of a short text column (`VARCHAR(255)`).
pub const MAX_SHORT_TEXT_LENGTH: usize = 255;

/// Validates that a required text value is present and not only whitespace.
pub fn validate_required_text(value: Option<&str>) -> Result<&str, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => {
            let mut err = ValidationError::new("blank");
            err.message = Some("Value can not be blank".into());
            Err(err)
        }
        None => {
            let mut err = ValidationError::new("required");
            err.message = Some("Value is required".into());
            Err(err)
        }
    }
}

/// Validates that an optional text value, when provided, is not only whitespace.
pub fn validate_optional_text(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.trim().is_empty() => {
            let mut err = ValidationError::new("blank");
            err.message = Some("Value can not be blank".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// Validates that a value fits in a short text column.
pub fn validate_short_text(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() <= MAX_SHORT_TEXT_LENGTH {
        Ok(())
    } else {
        let mut err = ValidationError::new("length");
        err.message = Some("Value must be at most 255 characters".into());
        Err(err)
    }
}
