//! Request limits and field validators shared by the API DTOs.

use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

use crate::error::CoreError;

/// Minimum length of a create prompt.
pub const CREATE_PROMPT_MIN: u64 = 5;
/// Minimum length of edit and panel prompts.
pub const EDIT_PROMPT_MIN: u64 = 3;
/// Maximum length of any prompt.
pub const PROMPT_MAX: u64 = 2000;

/// Allowed number of reference images for a create job.
pub const IMAGE_COUNT_MIN: u8 = 1;
pub const IMAGE_COUNT_MAX: u8 = 6;

/// Known package shapes.
pub const PACKAGE_BOX: &str = "box";
pub const PACKAGE_CYLINDER: &str = "cylinder";
pub const VALID_PACKAGE_TYPES: &[&str] = &[PACKAGE_BOX, PACKAGE_CYLINDER];

/// Panel ids are short lowercase slugs (`front`, `body`, `left_flap`).
pub static PANEL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]{1,64}$").expect("panel id regex is valid"));

/// Validate a panel identifier.
pub fn validate_panel_id(panel_id: &str) -> Result<(), CoreError> {
    if PANEL_ID_RE.is_match(panel_id) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid panel id '{panel_id}': expected 1-64 chars of [a-z0-9_-]"
        )))
    }
}

/// `validator` custom hook for package type fields.
pub fn validate_package_type(value: &str) -> Result<(), ValidationError> {
    if VALID_PACKAGE_TYPES.contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("package_type");
        err.message = Some(format!("must be one of: {}", VALID_PACKAGE_TYPES.join(", ")).into());
        Err(err)
    }
}

/// Flatten `validator` errors into a single [`CoreError::Validation`].
pub fn into_core_error(errors: validator::ValidationErrors) -> CoreError {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let reasons: Vec<String> = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            format!("{field}: {}", reasons.join(", "))
        })
        .collect();
    parts.sort();
    CoreError::Validation(parts.join("; "))
}
