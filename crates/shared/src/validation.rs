//! Common validation utilities.

use validator::ValidationError;

/// Maximum length of a bundle identifier or app name (column width).
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Largest active-seconds value the store can hold (signed 64-bit column).
pub const MAX_ACTIVE_SECONDS: u64 = i64::MAX as u64;

/// Validates a bundle identifier: non-blank, no whitespace or control characters.
pub fn validate_bundle_identifier(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("bundle_identifier_empty");
        err.message = Some("Bundle identifier cannot be empty".into());
        return Err(err);
    }

    if value.len() > MAX_IDENTIFIER_LENGTH {
        let mut err = ValidationError::new("bundle_identifier_length");
        err.message = Some("Bundle identifier must be at most 255 characters".into());
        return Err(err);
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        let mut err = ValidationError::new("bundle_identifier_format");
        err.message = Some("Bundle identifier cannot contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that an active-seconds value fits the store.
pub fn validate_active_seconds(seconds: u64) -> Result<(), ValidationError> {
    if seconds <= MAX_ACTIVE_SECONDS {
        Ok(())
    } else {
        let mut err = ValidationError::new("active_seconds_range");
        err.message = Some("Active seconds exceeds the supported maximum".into());
        Err(err)
    }
}
