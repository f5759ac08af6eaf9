//! Application services
//!
//! - [`hierarchy`]: the State → Town → {Venue, Business, Band} directory and
//!   the event calendar
//! - [`accounts`]: login, signup and user administration
//!
//! Services validate input, check referential rules and translate store
//! failures into their own error types; they never see HTTP.

pub mod accounts;
pub mod hierarchy;

use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

/// One failed validation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Flattens validator output into field errors, sorted by field name
///
/// Struct-level rules are reported under the code of the failing rule rather
/// than `__all__`.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut details: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let field = if *field == "__all__" {
                    error.code.to_string()
                } else {
                    field.to_string()
                };
                FieldError {
                    field,
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                }
            })
        })
        .collect();

    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

/// Unwraps a field that validation already marked as required
fn required<T>(value: Option<T>, field: &str) -> Result<T, Vec<FieldError>> {
    value.ok_or_else(|| vec![FieldError::new(field, format!("{field} is required"))])
}

/// Trims a name and rejects it when nothing is left
fn non_blank(value: String, field: &str) -> Result<String, Vec<FieldError>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(vec![FieldError::new(field, format!("{field} must not be blank"))])
    } else {
        Ok(trimmed.to_string())
    }
}

/// Trims optional text and maps blank values to `None`
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
