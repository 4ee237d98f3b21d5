//! Input checks shared by the write services.

use crate::domain::error::DomainError;

/// Upper bound on comment bodies, in characters.
pub const COMMENT_MAX_CHARS: usize = 2000;

pub fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(())
}

pub fn ensure_max_chars(value: &str, field: &'static str, max: usize) -> Result<(), DomainError> {
    if value.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}
