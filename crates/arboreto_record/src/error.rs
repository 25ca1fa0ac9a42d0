//! Validation error kinds

use thiserror::Error;

/// Reason a decoded record was rejected.
///
/// Each variant carries a human-readable message suitable for the log line
/// that narrates the rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record must be a JSON object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid date format (expected YYYY-MM-DD)")]
    InvalidDate,

    #[error("height must be numeric")]
    NonNumericHeight,
}

impl ValidationError {
    /// Name of the record field this rejection is about, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::NotAnObject => None,
            ValidationError::MissingField(name) => Some(name),
            ValidationError::InvalidDate => Some("fecha"),
            ValidationError::NonNumericHeight => Some("altura_metros"),
        }
    }
}
