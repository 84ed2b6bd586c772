use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a data type's rows are reached from a donor record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Nesting {
    /// One row per donor.
    Direct,
    /// One row per element of a donor-level array.
    DonorNested,
    /// One row per element of an array nested inside each specimen.
    SpecimenNested,
}

/// An exportable clinical table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DownloadDataType {
    Donor,
    DonorExposure,
    DonorFamily,
    DonorTherapy,
    Specimen,
    Sample,
}

impl DownloadDataType {
    pub const ALL: [DownloadDataType; 6] = [
        DownloadDataType::Donor,
        DownloadDataType::DonorExposure,
        DownloadDataType::DonorFamily,
        DownloadDataType::DonorTherapy,
        DownloadDataType::Specimen,
        DownloadDataType::Sample,
    ];

    /// Identifier used in requests and output file names.
    pub fn id(self) -> &'static str {
        match self {
            DownloadDataType::Donor => "donor",
            DownloadDataType::DonorExposure => "donor_exposure",
            DownloadDataType::DonorFamily => "donor_family",
            DownloadDataType::DonorTherapy => "donor_therapy",
            DownloadDataType::Specimen => "specimen",
            DownloadDataType::Sample => "sample",
        }
    }

    pub fn nesting(self) -> Nesting {
        match self {
            DownloadDataType::Donor => Nesting::Direct,
            DownloadDataType::Sample => Nesting::SpecimenNested,
            _ => Nesting::DonorNested,
        }
    }

    pub fn from_id(id: &str) -> Result<Self, TaskError> {
        let wanted = id.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TaskError::UnknownDataType(id.to_string()))
    }
}

impl fmt::Display for DownloadDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DownloadDataType {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s)
    }
}

impl TryFrom<String> for DownloadDataType {
    type Error = TaskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_id(&value)
    }
}

impl From<DownloadDataType> for String {
    fn from(value: DownloadDataType) -> Self {
        value.id().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for t in DownloadDataType::ALL {
            assert_eq!(t.id().parse::<DownloadDataType>().unwrap(), t);
        }
    }

    #[test]
    fn request_ids_are_case_insensitive() {
        assert_eq!(
            DownloadDataType::from_id("DONOR_EXPOSURE").unwrap(),
            DownloadDataType::DonorExposure
        );
    }

    #[test]
    fn unknown_id_is_a_configuration_error() {
        let err = DownloadDataType::from_id("ssm_open").unwrap_err();
        assert!(matches!(err, TaskError::UnknownDataType(ref id) if id == "ssm_open"));
    }

    #[test]
    fn nesting_categories() {
        assert_eq!(DownloadDataType::Donor.nesting(), Nesting::Direct);
        assert_eq!(DownloadDataType::Specimen.nesting(), Nesting::DonorNested);
        assert_eq!(DownloadDataType::Sample.nesting(), Nesting::SpecimenNested);
    }
}
