//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes. Static shape checks
//! use `validator` derive on the request types; configuration-driven bounds
//! (payload size, context/recipient counts) are checked explicitly in the
//! handlers because their limits come from `AppConfig`.

use validator::Validate;

use crate::error::RelayError;

/// Validate a request body, returning a `RelayError::Validation` on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), RelayError> {
    body.validate().map_err(|e| RelayError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check a surface text against the configured byte bound.
pub fn validate_surface_text(text: &str, max_bytes: usize) -> Result<(), RelayError> {
    if text.trim().is_empty() {
        return Err(RelayError::Validation {
            message: "surfaceText cannot be empty".into(),
        });
    }
    if text.len() > max_bytes {
        return Err(RelayError::Validation {
            message: format!("surfaceText exceeds the {max_bytes}-byte limit"),
        });
    }
    Ok(())
}

/// Check a collection against a configured count bound.
pub fn validate_count(what: &str, len: usize, max: usize) -> Result<(), RelayError> {
    if len > max {
        return Err(RelayError::Validation {
            message: format!("too many {what}: {len} exceeds the limit of {max}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_text_bounds() {
        assert!(validate_surface_text("ship it", 1024).is_ok());
        assert!(validate_surface_text("", 1024).is_err());
        assert!(validate_surface_text("   ", 1024).is_err());
        assert!(validate_surface_text("aaaa", 3).is_err());
    }

    #[test]
    fn count_bounds() {
        assert!(validate_count("context items", 50, 50).is_ok());
        assert!(validate_count("context items", 51, 50).is_err());
    }
}
