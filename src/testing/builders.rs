//! Fluent builders for nested donor records.

use crate::record::{
    DONOR_ID, DonorRecord, EXPOSURES, FAMILIES, PROJECT_ID, SAMPLES, SPECIMEN_ID, SPECIMENS,
    SUBMISSION_SPECIMEN_ID, SUBMITTED_DONOR_ID, THERAPIES,
};
use serde_json::{Map, Value};

fn push(obj: &mut Map<String, Value>, field: &str, item: Value) {
    match obj.get_mut(field) {
        Some(Value::Array(items)) => items.push(item),
        _ => {
            obj.insert(field.to_string(), Value::Array(vec![item]));
        }
    }
}

/// Builds one donor record.
///
/// # Example
///
/// ```
/// use clinical_export::testing::{DonorBuilder, SpecimenBuilder};
///
/// let donor = DonorBuilder::new("D1", "PRJ1")
///     .field("donor_sex", "female")
///     .specimen(SpecimenBuilder::new("S1").sample("A").sample("B"))
///     .build();
/// assert_eq!(donor.donor_id().as_deref(), Some("D1"));
/// ```
#[derive(Debug, Clone)]
pub struct DonorBuilder {
    obj: Map<String, Value>,
}

impl DonorBuilder {
    /// A donor with `donor_id`, `project_id` and a derived `submitted_donor_id`.
    #[must_use]
    pub fn new(donor_id: &str, project_id: &str) -> Self {
        let mut obj = Map::new();
        obj.insert(DONOR_ID.into(), donor_id.into());
        obj.insert(PROJECT_ID.into(), project_id.into());
        obj.insert(SUBMITTED_DONOR_ID.into(), format!("sub-{donor_id}").into());
        Self { obj }
    }

    #[must_use]
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.obj.insert(name.to_string(), value.into());
        self
    }

    /// Remove a field, e.g. to produce a donor missing an identifier.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.obj.remove(name);
        self
    }

    #[must_use]
    pub fn specimen(mut self, specimen: SpecimenBuilder) -> Self {
        push(&mut self.obj, SPECIMENS, specimen.build());
        self
    }

    #[must_use]
    pub fn exposure(mut self, exposure: Value) -> Self {
        push(&mut self.obj, EXPOSURES, exposure);
        self
    }

    #[must_use]
    pub fn family(mut self, family: Value) -> Self {
        push(&mut self.obj, FAMILIES, family);
        self
    }

    #[must_use]
    pub fn therapy(mut self, therapy: Value) -> Self {
        push(&mut self.obj, THERAPIES, therapy);
        self
    }

    #[must_use]
    pub fn build(self) -> DonorRecord {
        DonorRecord::from(self.obj)
    }
}

/// Builds one specimen object with its samples.
#[derive(Debug, Clone)]
pub struct SpecimenBuilder {
    obj: Map<String, Value>,
}

impl SpecimenBuilder {
    /// A specimen with `specimen_id` and a derived `submission_specimen_id`.
    #[must_use]
    pub fn new(specimen_id: &str) -> Self {
        let mut obj = Map::new();
        obj.insert(SPECIMEN_ID.into(), specimen_id.into());
        obj.insert(SUBMISSION_SPECIMEN_ID.into(), format!("sub-{specimen_id}").into());
        Self { obj }
    }

    #[must_use]
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.obj.insert(name.to_string(), value.into());
        self
    }

    /// Add a sample carrying only its id and a derived submitter id.
    #[must_use]
    pub fn sample(self, sample_id: &str) -> Self {
        let mut sample = Map::new();
        sample.insert("sample_id".into(), sample_id.into());
        sample.insert("submitted_sample_id".into(), format!("sub-{sample_id}").into());
        self.sample_with(Value::Object(sample))
    }

    #[must_use]
    pub fn sample_with(mut self, sample: Value) -> Self {
        push(&mut self.obj, SAMPLES, sample);
        self
    }

    #[must_use]
    pub fn build(self) -> Value {
        Value::Object(self.obj)
    }
}
