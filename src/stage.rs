//! The generic unwind → pair → convert runner.
//!
//! Every data type goes through [`flatten_donor`]; only the registered
//! [`ExportSpec`] differs. Direct types have an empty unwind path: the donor
//! itself is converted into the single row, without pairing any keys.

use crate::convert::{ConvertedRow, convert_with};
use crate::data_type::DownloadDataType;
use crate::diagnostics::{RecordError, Stage};
use crate::error::ConversionError;
use crate::keys::CorrelationKeys;
use crate::record::{DonorRecord, PROJECT_ID};
use crate::schema::ExportSpec;
use crate::unwind::unwind;

/// Result of flattening one donor for one data type.
#[derive(Clone, Debug, PartialEq)]
pub enum Flattened {
    Row {
        project: String,
        row: ConvertedRow,
    },
    Skipped {
        stage: Stage,
        donor_id: Option<String>,
        error: ConversionError,
    },
}

impl Flattened {
    /// Diagnostic entry for a skipped element; `None` for a row.
    pub fn record_error(&self, data_type: DownloadDataType) -> Option<RecordError> {
        match self {
            Flattened::Row { .. } => None,
            Flattened::Skipped {
                stage,
                donor_id,
                error,
            } => Some(RecordError::new(*stage, Some(data_type), donor_id.clone(), error)),
        }
    }
}

/// Flatten `donor` into rows of `spec`'s table.
///
/// Malformed subtrees come back as [`Flattened::Skipped`] next to the rows
/// that could be produced; the caller decides whether that is fatal.
pub fn flatten_donor(spec: &ExportSpec, donor: &DonorRecord) -> Vec<Flattened> {
    let skipped = |stage: Stage, error: ConversionError| Flattened::Skipped {
        stage,
        donor_id: donor.donor_id(),
        error,
    };

    if spec.is_direct() {
        return match convert_with(spec, &CorrelationKeys::new(), donor) {
            Ok(row) => vec![Flattened::Row {
                project: donor.project_id().unwrap_or_default(),
                row,
            }],
            Err(e) => vec![skipped(Stage::Convert, e)],
        };
    }

    let root = match CorrelationKeys::new().pair_carrying(donor, spec.root_keys, spec.carried_keys) {
        Ok(keys) => keys,
        Err(e) => return vec![skipped(Stage::Pair, e)],
    };
    let project = root.get(PROJECT_ID).unwrap_or_default().to_string();

    unwind(donor, &root, spec.path)
        .map(|item| match item {
            Ok((row, keys)) => match convert_with(spec, &keys, &row) {
                Ok(row) => Flattened::Row {
                    project: project.clone(),
                    row,
                },
                Err(e) => skipped(Stage::Convert, e),
            },
            Err(e @ ConversionError::MissingKey { .. }) => skipped(Stage::Pair, e),
            Err(e) => skipped(Stage::Unwind, e),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Row;
    use serde_json::json;

    fn donor(v: serde_json::Value) -> Row {
        Row::try_from(v).unwrap()
    }

    fn rows(out: &[Flattened]) -> Vec<&ConvertedRow> {
        out.iter()
            .filter_map(|f| match f {
                Flattened::Row { row, .. } => Some(row),
                Flattened::Skipped { .. } => None,
            })
            .collect()
    }

    #[test]
    fn direct_type_yields_exactly_one_row() {
        let d = donor(json!({"donor_id": "D1", "project_id": "PRJ1", "submitted_donor_id": "x",
                             "specimens": [{"specimen_id": "S1"}]}));
        let out = flatten_donor(ExportSpec::of(DownloadDataType::Donor), &d);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Flattened::Row { project, .. } if project == "PRJ1"));
    }

    #[test]
    fn direct_type_needs_no_identifiers() {
        let d = donor(json!({"donor_id": "D1", "donor_sex": "female"}));
        let out = flatten_donor(ExportSpec::of(DownloadDataType::Donor), &d);
        assert_eq!(out.len(), 1);
        let Flattened::Row { project, row } = &out[0] else {
            panic!("expected a row, got {:?}", out[0]);
        };
        assert_eq!(project, "");
        assert_eq!(&row[..4], ["D1", "", "", "female"]);
    }

    #[test]
    fn nested_rows_survive_a_missing_submitted_donor_id() {
        let d = donor(json!({"donor_id": 7, "project_id": "PRJ1",
                             "therapies": [{"first_therapy_type": "surgery"}]}));
        let out = flatten_donor(ExportSpec::of(DownloadDataType::DonorTherapy), &d);
        let rows = rows(&out);
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][..4], ["7", "PRJ1", "", "surgery"]);
    }

    #[test]
    fn donor_without_identifiers_is_skipped() {
        let d = donor(json!({"project_id": "PRJ1", "exposures": [{}]}));
        let out = flatten_donor(ExportSpec::of(DownloadDataType::DonorExposure), &d);
        assert_eq!(out.len(), 1);
        let err = out[0]
            .record_error(DownloadDataType::DonorExposure)
            .expect("skipped record");
        assert_eq!(err.stage, Stage::Pair);
        assert_eq!(err.data_type, Some(DownloadDataType::DonorExposure));
        assert_eq!(err.donor_id, None);
    }

    #[test]
    fn bad_value_skips_only_that_element() {
        let d = donor(json!({
            "donor_id": "D1", "project_id": "PRJ1", "submitted_donor_id": "x",
            "families": [{"relationship_age": "old"}, {"relationship_age": 61}]
        }));
        let out = flatten_donor(ExportSpec::of(DownloadDataType::DonorFamily), &d);
        assert_eq!(out.len(), 2);
        assert_eq!(rows(&out).len(), 1);
        assert_eq!(rows(&out)[0][7], "61");
    }
}
