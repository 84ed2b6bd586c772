//! Hierarchical input records.
//!
//! A donor record is a JSON object: scalar donor fields plus the nested
//! arrays `specimens` (each holding `samples`), `exposures`, `families` and
//! `therapies`. Records are read once and never mutated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DONOR_ID: &str = "donor_id";
pub const PROJECT_ID: &str = "project_id";
pub const SUBMITTED_DONOR_ID: &str = "submitted_donor_id";
pub const SPECIMEN_ID: &str = "specimen_id";
pub const SUBMISSION_SPECIMEN_ID: &str = "submission_specimen_id";

pub const SPECIMENS: &str = "specimens";
pub const SAMPLES: &str = "samples";
pub const EXPOSURES: &str = "exposures";
pub const FAMILIES: &str = "families";
pub const THERAPIES: &str = "therapies";

/// One level of a record tree: a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

/// A top-level record.
pub type DonorRecord = Row;

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field value, with JSON `null` reported as absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    /// Field as a string, if it is one.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Identifier field as text: strings verbatim, numbers and booleans in
    /// their canonical JSON form. `None` when absent, `null` or not a scalar.
    ///
    /// This is the same rendering correlation keys use, so an id read here
    /// matches the id written to the tables.
    pub fn id_text(&self, field: &str) -> Option<String> {
        self.get(field).and_then(scalar_text)
    }

    pub fn donor_id(&self) -> Option<String> {
        self.id_text(DONOR_ID)
    }

    pub fn project_id(&self) -> Option<String> {
        self.id_text(PROJECT_ID)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Builder-style setter, mostly for fixtures.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }
}

/// Text form of a scalar identifier value.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Row {
    type Error = Value;

    /// Fails with the original value when it is not a JSON object.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_fields_read_as_absent() {
        let row = Row::try_from(json!({"donor_id": "DO1", "project_id": null})).unwrap();
        assert_eq!(row.donor_id().as_deref(), Some("DO1"));
        assert_eq!(row.project_id(), None);
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn identifiers_render_numbers_canonically() {
        let row = Row::try_from(json!({"donor_id": 42, "project_id": ["P"], "flag": true})).unwrap();
        assert_eq!(row.donor_id().as_deref(), Some("42"));
        assert_eq!(row.project_id(), None);
        assert_eq!(row.id_text("flag").as_deref(), Some("true"));
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(Row::try_from(json!([1, 2])).is_err());
    }
}
