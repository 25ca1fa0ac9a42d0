//! Record validation.
//!
//! Rules are applied in order and the first failure wins:
//!
//! 1. every required field is present (`null` counts as absent)
//! 2. `fecha` is a calendar date written as `YYYY-MM-DD`
//! 3. `altura_metros`, when present, is a number, boolean or numeric string
//!
//! Only these rules reject. Other shapes are tolerated: non-string text
//! fields are rendered as their JSON text and malformed `tabla_extendida`
//! rows are skipped. Validation is a pure function of the decoded JSON
//! document and never panics.

use crate::error::ValidationError;
use crate::record::{numeric_value, TreeRecord};
use chrono::NaiveDate;
use serde_json::Value;

/// Fields every record must carry, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 4] = ["id", "nombre", "descripcion", "fecha"];

/// Message reported for a record that passes every rule.
pub const VALID_MESSAGE: &str = "valid";

/// Check a decoded JSON document against the record rules.
pub fn validate(value: &Value) -> Result<(), ValidationError> {
    checked_fecha(value).map(|_| ())
}

/// Validate a decoded JSON document and convert it into a [`TreeRecord`].
pub fn parse_record(value: &Value) -> Result<TreeRecord, ValidationError> {
    let fecha = checked_fecha(value)?;
    let fields = value.as_object().ok_or(ValidationError::NotAnObject)?;
    Ok(TreeRecord::from_validated(fields, fecha))
}

fn checked_fecha(value: &Value) -> Result<NaiveDate, ValidationError> {
    let fields = value.as_object().ok_or(ValidationError::NotAnObject)?;

    for name in REQUIRED_FIELDS {
        if matches!(fields.get(name), None | Some(Value::Null)) {
            return Err(ValidationError::MissingField(name));
        }
    }

    let fecha = fields
        .get("fecha")
        .and_then(Value::as_str)
        .and_then(parse_fecha)
        .ok_or(ValidationError::InvalidDate)?;

    if let Some(height) = fields.get("altura_metros") {
        if numeric_value(height).is_none() {
            return Err(ValidationError::NonNumericHeight);
        }
    }

    Ok(fecha)
}

/// `YYYY-MM-DD`: a four digit year, one or two digit month and day, and a
/// real calendar date. `2023-5-1` is accepted, `2023/05/01` is not.
fn parse_fecha(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let digits = |part: &str, min: usize, max: usize| {
        (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(year, 4, 4) || !digits(month, 1, 2) || !digits(day, 1, 2) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}
