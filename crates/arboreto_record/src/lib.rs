//! Arboreto record model.
//!
//! A [`TreeRecord`] is decoded from one JSON file dropped into the watch root.
//! Records are untrusted: [`validate`] checks the raw JSON document before
//! anything else touches it, and [`parse_record`] is the only way to build a
//! typed record from it.

pub mod error;
pub mod record;
pub mod validate;

pub use error::ValidationError;
pub use record::{TableRow, TreeRecord};
pub use validate::{parse_record, validate, REQUIRED_FIELDS, VALID_MESSAGE};
