//! Declarative export definitions.
//!
//! Each [`DownloadDataType`] is described by one [`ExportSpec`]: the keys
//! captured from the donor, the path of arrays to unwind (with the keys each
//! level contributes) and the ordered output columns. A single stage runner
//! interprets these, so adding a table is a matter of adding data here.

use crate::data_type::{DownloadDataType, Nesting};
use crate::record::{
    DONOR_ID, EXPOSURES, FAMILIES, PROJECT_ID, SAMPLES, SPECIMEN_ID, SPECIMENS,
    SUBMISSION_SPECIMEN_ID, SUBMITTED_DONOR_ID, THERAPIES,
};

/// Formatting rule applied to a column value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
    }
}

const fn int(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Integer,
    }
}

const fn dec(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Decimal,
    }
}

/// One level of descent: the array field to expand and the identifiers each
/// expanded element contributes to the correlation keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnwindStep {
    pub field: &'static str,
    /// Required on every element; a missing one skips that element.
    pub keys: &'static [&'static str],
    /// Copied down when present.
    pub carried: &'static [&'static str],
}

#[derive(Clone, Copy, Debug)]
pub struct ExportSpec {
    pub data_type: DownloadDataType,
    /// Donor-level identifiers captured before any unwinding. Ignored by
    /// direct types, which convert the donor as it is.
    pub root_keys: &'static [&'static str],
    /// Donor-level fields carried down alongside `root_keys` when present.
    pub carried_keys: &'static [&'static str],
    /// Empty for direct types.
    pub path: &'static [UnwindStep],
    pub columns: &'static [Column],
}

impl ExportSpec {
    /// Registered definition for `data_type`.
    pub fn of(data_type: DownloadDataType) -> &'static ExportSpec {
        match data_type {
            DownloadDataType::Donor => &DONOR,
            DownloadDataType::DonorExposure => &DONOR_EXPOSURE,
            DownloadDataType::DonorFamily => &DONOR_FAMILY,
            DownloadDataType::DonorTherapy => &DONOR_THERAPY,
            DownloadDataType::Specimen => &SPECIMEN,
            DownloadDataType::Sample => &SAMPLE,
        }
    }

    pub fn nesting(&self) -> Nesting {
        self.data_type.nesting()
    }

    pub fn is_direct(&self) -> bool {
        self.path.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

const DONOR_KEYS: &[&str] = &[DONOR_ID, PROJECT_ID];
const DONOR_CARRIED: &[&str] = &[SUBMITTED_DONOR_ID];

static DONOR: ExportSpec = ExportSpec {
    data_type: DownloadDataType::Donor,
    root_keys: DONOR_KEYS,
    carried_keys: DONOR_CARRIED,
    path: &[],
    columns: &[
        text(DONOR_ID),
        text(PROJECT_ID),
        text(SUBMITTED_DONOR_ID),
        text("donor_sex"),
        text("donor_vital_status"),
        text("disease_status_last_followup"),
        text("donor_relapse_type"),
        int("donor_age_at_diagnosis"),
        int("donor_age_at_enrollment"),
        int("donor_age_at_last_followup"),
        int("donor_relapse_interval"),
        text("donor_diagnosis_icd10"),
        text("donor_tumour_staging_system_at_diagnosis"),
        text("donor_tumour_stage_at_diagnosis"),
        int("donor_survival_time"),
        int("donor_interval_of_last_followup"),
        text("prior_malignancy"),
        text("cancer_type_prior_malignancy"),
        text("cancer_history_first_degree_relative"),
    ],
};

static DONOR_EXPOSURE: ExportSpec = ExportSpec {
    data_type: DownloadDataType::DonorExposure,
    root_keys: DONOR_KEYS,
    carried_keys: DONOR_CARRIED,
    path: &[UnwindStep {
        field: EXPOSURES,
        keys: &[],
        carried: &[],
    }],
    columns: &[
        text(DONOR_ID),
        text(PROJECT_ID),
        text(SUBMITTED_DONOR_ID),
        text("exposure_type"),
        text("exposure_intensity"),
        text("tobacco_smoking_history_indicator"),
        dec("tobacco_smoking_intensity"),
        text("alcohol_history"),
        text("alcohol_history_intensity"),
    ],
};

static DONOR_FAMILY: ExportSpec = ExportSpec {
    data_type: DownloadDataType::DonorFamily,
    root_keys: DONOR_KEYS,
    carried_keys: DONOR_CARRIED,
    path: &[UnwindStep {
        field: FAMILIES,
        keys: &[],
        carried: &[],
    }],
    columns: &[
        text(DONOR_ID),
        text(PROJECT_ID),
        text(SUBMITTED_DONOR_ID),
        text("donor_has_relative_with_cancer_history"),
        text("relationship_type"),
        text("relationship_type_other"),
        text("relationship_sex"),
        int("relationship_age"),
        text("relationship_disease_icd10"),
        text("relationship_disease"),
    ],
};

static DONOR_THERAPY: ExportSpec = ExportSpec {
    data_type: DownloadDataType::DonorTherapy,
    root_keys: DONOR_KEYS,
    carried_keys: DONOR_CARRIED,
    path: &[UnwindStep {
        field: THERAPIES,
        keys: &[],
        carried: &[],
    }],
    columns: &[
        text(DONOR_ID),
        text(PROJECT_ID),
        text(SUBMITTED_DONOR_ID),
        text("first_therapy_type"),
        text("first_therapy_therapeutic_intent"),
        int("first_therapy_start_interval"),
        int("first_therapy_duration"),
        text("first_therapy_response"),
        text("second_therapy_type"),
        text("second_therapy_therapeutic_intent"),
        int("second_therapy_start_interval"),
        int("second_therapy_duration"),
        text("second_therapy_response"),
        text("other_therapy"),
        text("other_therapy_response"),
    ],
};

static SPECIMEN: ExportSpec = ExportSpec {
    data_type: DownloadDataType::Specimen,
    root_keys: DONOR_KEYS,
    carried_keys: DONOR_CARRIED,
    path: &[UnwindStep {
        field: SPECIMENS,
        keys: &[],
        carried: &[],
    }],
    columns: &[
        text(SPECIMEN_ID),
        text(PROJECT_ID),
        text(SUBMISSION_SPECIMEN_ID),
        text(DONOR_ID),
        text(SUBMITTED_DONOR_ID),
        text("specimen_type"),
        text("specimen_type_other"),
        int("specimen_interval"),
        text("specimen_donor_treatment_type"),
        text("specimen_processing"),
        text("specimen_storage"),
        text("tumour_confirmed"),
        text("tumour_histological_type"),
        text("tumour_grade"),
        int("percentage_cellularity"),
        text("level_of_cellularity"),
    ],
};

static SAMPLE: ExportSpec = ExportSpec {
    data_type: DownloadDataType::Sample,
    root_keys: DONOR_KEYS,
    carried_keys: DONOR_CARRIED,
    path: &[
        UnwindStep {
            field: SPECIMENS,
            keys: &[SPECIMEN_ID],
            carried: &[SUBMISSION_SPECIMEN_ID],
        },
        UnwindStep {
            field: SAMPLES,
            keys: &[],
            carried: &[],
        },
    ],
    columns: &[
        text("sample_id"),
        text(PROJECT_ID),
        text("submitted_sample_id"),
        text(SPECIMEN_ID),
        text(SUBMISSION_SPECIMEN_ID),
        text(DONOR_ID),
        text(SUBMITTED_DONOR_ID),
        int("analyzed_sample_interval"),
        int("percentage_cellularity"),
        text("level_of_cellularity"),
        text("study"),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_type_is_registered_under_its_own_id() {
        for t in DownloadDataType::ALL {
            assert_eq!(ExportSpec::of(t).data_type, t);
        }
    }

    #[test]
    fn path_depth_matches_nesting() {
        for t in DownloadDataType::ALL {
            let spec = ExportSpec::of(t);
            let depth = match t.nesting() {
                Nesting::Direct => 0,
                Nesting::DonorNested => 1,
                Nesting::SpecimenNested => 2,
            };
            assert_eq!(spec.path.len(), depth, "{t}");
        }
    }

    #[test]
    fn column_names_are_unique_and_include_donor_keys() {
        for t in DownloadDataType::ALL {
            let spec = ExportSpec::of(t);
            let names: HashSet<_> = spec.column_names().collect();
            assert_eq!(names.len(), spec.columns.len(), "{t}");
            for key in spec.root_keys.iter().chain(spec.carried_keys) {
                assert!(names.contains(key), "{t} is missing {key}");
            }
        }
    }
}
