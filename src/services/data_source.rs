//! Trait and types for the collaborators the coverage checker reads from.

use std::fmt;

use crate::coverage::types::{EntityList, ObservationTable, SizeTable};
use crate::crosswalk::Crosswalk;
use crate::error::Result;
use crate::period::Frequency;

/// Identifies one sub-dataset of a provider's dataset, e.g. IMF / IFS / `Exchange_Rates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub provider: String,
    pub dataset: String,
    pub subdata: String,
}

impl DatasetRef {
    pub fn new(provider: impl Into<String>, dataset: impl Into<String>, subdata: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            dataset: dataset.into(),
            subdata: subdata.into(),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.dataset, self.subdata)
    }
}

/// Abstraction over wherever observations, reference entities and size data come from.
pub trait DataSource {
    /// Observations of `series_ids` at `frequency`.
    ///
    /// Fails with [`crate::error::CoverageError::SeriesNotFound`] listing every
    /// requested id the source does not know.
    fn observations(
        &self,
        dataset: &DatasetRef,
        series_ids: &[String],
        frequency: Frequency,
    ) -> Result<ObservationTable>;

    /// Every entity expected to report in the dataset.
    fn reference_entities(&self, dataset: &DatasetRef) -> Result<EntityList>;

    /// The size metric table; [`crate::error::CoverageError::MissingSizeData`] if
    /// it has not been fetched.
    fn size_ranking(&self, metric: &str) -> Result<SizeTable>;

    /// Code-system crosswalk between reference ids and size-table ids.
    fn crosswalk(&self) -> Result<Crosswalk>;
}
