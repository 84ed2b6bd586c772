use crate::data_type::DownloadDataType;
use crate::schema::ExportSpec;
use std::ops::Deref;

/// Ordered column names of one output table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header(Vec<&'static str>);

impl Header {
    pub fn columns(&self) -> &[&'static str] {
        &self.0
    }
}

impl Deref for Header {
    type Target = [&'static str];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Canonical header for `data_type`, derived from its registered schema.
pub fn header(data_type: DownloadDataType) -> Header {
    Header(ExportSpec::of(data_type).column_names().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_header_leads_with_sample_and_project() {
        let h = header(DownloadDataType::Sample);
        assert_eq!(&h[..3], &["sample_id", "project_id", "submitted_sample_id"]);
        assert_eq!(h.len(), ExportSpec::of(DownloadDataType::Sample).columns.len());
    }

    #[test]
    fn lookup_is_stable() {
        for t in DownloadDataType::ALL {
            assert_eq!(header(t), header(t));
        }
    }
}
