//! Registry of the provider datasets the local store knows how to read.

use crate::crosswalk::CodeSystem;
use crate::error::{CoverageError, Result};

/// Where a dataset lives in the store and how its entities are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetLayout {
    pub provider: &'static str,
    pub dataset: &'static str,
    /// Directory under the data root holding `{subdata}.csv` and `datastructure.json`.
    pub dir: &'static str,
    pub code_system: CodeSystem,
    /// Code list ids (or id prefixes) holding the reference entities.
    pub entity_codelists: &'static [&'static str],
}

const LAYOUTS: &[DatasetLayout] = &[
    DatasetLayout {
        provider: "IMF",
        dataset: "IFS",
        dir: "imf_ifs",
        code_system: CodeSystem::Iso2,
        entity_codelists: &["REF_AREA", "CL_AREA", "CL_REF_AREA"],
    },
    DatasetLayout {
        provider: "IMF",
        dataset: "BOP",
        dir: "imf_bop",
        code_system: CodeSystem::Iso2,
        entity_codelists: &["REF_AREA", "CL_AREA", "CL_REF_AREA"],
    },
];

impl DatasetLayout {
    /// Looks up a provider/dataset pair, case-insensitively.
    pub fn lookup(provider: &str, dataset: &str) -> Result<&'static DatasetLayout> {
        LAYOUTS
            .iter()
            .find(|l| l.provider.eq_ignore_ascii_case(provider) && l.dataset.eq_ignore_ascii_case(dataset))
            .ok_or_else(|| CoverageError::UnsupportedDataset {
                provider: provider.to_string(),
                dataset: dataset.to_string(),
            })
    }

    /// True if a code list id names this dataset's entity list.
    pub fn is_entity_codelist(&self, id: &str) -> bool {
        let id = id.trim().to_ascii_uppercase();
        self.entity_codelists
            .iter()
            .any(|c| id == *c || id.starts_with(&format!("{c}_")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let layout = DatasetLayout::lookup("imf", "ifs").unwrap();
        assert_eq!(layout.dir, "imf_ifs");
        assert_eq!(layout.code_system, CodeSystem::Iso2);
    }

    #[test]
    fn test_unknown_dataset_is_unsupported() {
        let err = DatasetLayout::lookup("OECD", "MEI").unwrap_err();
        assert!(matches!(err, CoverageError::UnsupportedDataset { .. }));
    }

    #[test]
    fn test_entity_codelist_matching() {
        let layout = DatasetLayout::lookup("IMF", "IFS").unwrap();
        assert!(layout.is_entity_codelist("CL_AREA_IFS"));
        assert!(layout.is_entity_codelist("REF_AREA"));
        assert!(!layout.is_entity_codelist("CL_INDICATOR_IFS"));
        assert!(!layout.is_entity_codelist("CL_AREACODE"));
    }
}
