//! Core record types
//!
//! A record exists only in memory for one pipeline pass. It is never mutated
//! after construction; every file event produces a fresh value.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

/// Format used for `fecha` on input and in rendered documents.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Characters that never make it into an output filename.
const UNSAFE_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// One tree description, decoded from a single JSON file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeRecord {
    /// Stable identifier, also the first half of the output filename
    pub id: String,
    /// Display name
    pub nombre: String,
    /// Free text description
    pub descripcion: String,
    /// Observation date
    pub fecha: NaiveDate,
    pub ubicacion: Option<String>,
    pub especie: Option<String>,
    /// Height in meters (the input may carry it as a number or numeric string)
    pub altura_metros: Option<f64>,
    pub edad_aproximada: Option<String>,
    pub estado_salud: Option<String>,
    /// Image path relative to the image root
    pub imagen: Option<String>,
    /// Caption under the image
    pub pie_imagen: Option<String>,
    /// Caption under the details table
    pub pie_tabla: Option<String>,
    /// Extra attribute/value rows appended to the details table
    pub tabla_extendida: Vec<TableRow>,
}

/// One `{atributo, valor}` pair of the extended table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub atributo: String,
    pub valor: String,
}

impl TreeRecord {
    /// Build a record from a JSON object that already passed validation.
    ///
    /// Validation guarantees every lookup below succeeds; the fallbacks only
    /// exist so this stays total.
    pub(crate) fn from_validated(fields: &Map<String, Value>, fecha: NaiveDate) -> Self {
        Self {
            id: fields.get("id").map(scalar_text).unwrap_or_default(),
            nombre: fields.get("nombre").map(scalar_text).unwrap_or_default(),
            descripcion: fields.get("descripcion").map(scalar_text).unwrap_or_default(),
            fecha,
            ubicacion: optional_text(fields, "ubicacion"),
            especie: optional_text(fields, "especie"),
            altura_metros: fields.get("altura_metros").and_then(numeric_value),
            edad_aproximada: optional_text(fields, "edad_aproximada"),
            estado_salud: optional_text(fields, "estado_salud"),
            imagen: optional_text(fields, "imagen"),
            pie_imagen: optional_text(fields, "pie_imagen"),
            pie_tabla: optional_text(fields, "pie_tabla"),
            tabla_extendida: fields
                .get("tabla_extendida")
                .and_then(Value::as_array)
                .map(|rows| rows.iter().filter_map(table_row).collect())
                .unwrap_or_default(),
        }
    }

    /// Output file stem: `<id>_<nombre>` with spaces turned into underscores.
    ///
    /// Path separators and other characters that are not valid in a filename
    /// are replaced as well, so a record can never name a file outside the
    /// output directory.
    pub fn output_stem(&self) -> String {
        format!("{}_{}", filename_safe(&self.id), filename_safe(&self.nombre))
    }

    /// `fecha` in its original `YYYY-MM-DD` form.
    pub fn fecha_text(&self) -> String {
        self.fecha.format(DATE_FORMAT).to_string()
    }

    /// True when the record carries anything for the details table.
    pub fn has_details(&self) -> bool {
        self.especie.is_some()
            || self.altura_metros.is_some()
            || self.edad_aproximada.is_some()
            || self.estado_salud.is_some()
            || !self.tabla_extendida.is_empty()
    }
}

fn filename_safe(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch == ' ' || ch.is_control() || UNSAFE_FILENAME_CHARS.contains(&ch) {
                '_'
            } else {
                ch
            }
        })
        .collect()
}

fn optional_text(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name) {
        None | Some(Value::Null) => None,
        Some(value) => Some(scalar_text(value)),
    }
}

/// Text form of a JSON value: strings verbatim, everything else as JSON.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Interpret a JSON number, boolean or numeric string as an `f64`.
///
/// Strings are trimmed and may spell `inf` or `nan`; booleans count as 1 and 0.
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn table_row(value: &Value) -> Option<TableRow> {
    let obj = value.as_object()?;
    Some(TableRow {
        atributo: obj.get("atributo").map(scalar_text)?,
        valor: obj.get("valor").map(scalar_text).unwrap_or_default(),
    })
}
