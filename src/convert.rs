//! Flattening of one (keys, row) pair into the ordered values of a schema.

use crate::data_type::DownloadDataType;
use crate::error::ConversionError;
use crate::keys::CorrelationKeys;
use crate::record::Row;
use crate::schema::{Column, ColumnKind, ExportSpec};
use serde_json::{Number, Value};
use std::ops::Deref;

/// Values of one output line, in header order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConvertedRow(Vec<String>);

impl ConvertedRow {
    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn into_values(self) -> Vec<String> {
        self.0
    }
}

impl Deref for ConvertedRow {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[String]> for ConvertedRow {
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for ConvertedRow {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

/// Convert `row` into the columns of `data_type`.
///
/// For the direct (donor) type the keys are ignored. For nested types a
/// column named like a correlation key takes the key's value, shadowing any
/// same-named field of the row itself.
pub fn convert(
    data_type: DownloadDataType,
    keys: &CorrelationKeys,
    row: &Row,
) -> Result<ConvertedRow, ConversionError> {
    convert_with(ExportSpec::of(data_type), keys, row)
}

pub(crate) fn convert_with(
    spec: &ExportSpec,
    keys: &CorrelationKeys,
    row: &Row,
) -> Result<ConvertedRow, ConversionError> {
    let use_keys = !spec.is_direct();
    spec.columns
        .iter()
        .map(|column| match keys.get(column.name) {
            Some(value) if use_keys => Ok(value.to_string()),
            _ => format_value(column, row.get(column.name)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ConvertedRow)
}

/// Render one field according to its column kind. Absent values become "".
pub fn format_value(column: &Column, value: Option<&Value>) -> Result<String, ConversionError> {
    let invalid = |reason: &str| ConversionError::InvalidValue {
        column: column.name.to_string(),
        reason: reason.to_string(),
    };

    let Some(value) = value else {
        return Ok(String::new());
    };

    match (column.kind, value) {
        (_, Value::Null) => Ok(String::new()),
        (_, Value::Array(_) | Value::Object(_)) => Err(invalid("nested value in a flat column")),
        (ColumnKind::Text, Value::String(s)) => Ok(s.clone()),
        (ColumnKind::Text, Value::Bool(b)) => Ok(b.to_string()),
        (ColumnKind::Text, Value::Number(n)) => Ok(n.to_string()),
        (ColumnKind::Integer, Value::Number(n)) => {
            integer_text(n).ok_or_else(|| invalid(&format!("{n} is not an integer")))
        }
        (ColumnKind::Integer, Value::String(s)) => match s.trim() {
            "" => Ok(String::new()),
            t => t
                .parse::<Number>()
                .ok()
                .and_then(|n| integer_text(&n))
                .ok_or_else(|| invalid(&format!("'{s}' is not an integer"))),
        },
        (ColumnKind::Decimal, Value::Number(n)) => Ok(n.to_string()),
        (ColumnKind::Decimal, Value::String(s)) => match s.trim() {
            "" => Ok(String::new()),
            t => t
                .parse::<Number>()
                .map(|n| n.to_string())
                .map_err(|_| invalid(&format!("'{s}' is not a number"))),
        },
        (ColumnKind::Integer | ColumnKind::Decimal, Value::Bool(_)) => {
            Err(invalid("boolean in a numeric column"))
        }
    }
}

/// `45`, `45.0` and `-3` are integers; `45.5` is not.
fn integer_text(n: &Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return Some(i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.to_string());
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        Some(format!("{}", f as i64))
    } else {
        None
    }
}
