//! [`DataSource`] backed by files under the configured data root.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use super::codelist::DataStructure;
use super::layout::DatasetLayout;
use super::size_table;
use crate::config::Config;
use crate::coverage::types::{EntityList, Observation, ObservationTable, SizeTable};
use crate::crosswalk::Crosswalk;
use crate::error::{CoverageError, Result};
use crate::period::{Frequency, Period};
use crate::services::{DataSource, DatasetRef};

const DATA_STRUCTURE_FILE: &str = "datastructure.json";

/// One row of a sub-dataset's observation CSV.
#[derive(Debug, Deserialize)]
struct ObservationRow {
    indicator: String,
    ref_area: String,
    #[serde(default)]
    reference_area: Option<String>,
    period: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    value: Option<f64>,
    #[serde(default)]
    freq: Option<String>,
}

pub struct CsvDataStore {
    data_root: PathBuf,
    size_dir: PathBuf,
    size_metric: String,
    crosswalk_path: Option<PathBuf>,
}

impl CsvDataStore {
    pub fn new(config: &Config) -> Self {
        Self {
            data_root: config.data_root().to_path_buf(),
            size_dir: config.size_dir(),
            size_metric: config.size_metric.clone(),
            crosswalk_path: config.crosswalk_path.clone(),
        }
    }

    fn dataset_dir(&self, dataset: &DatasetRef) -> Result<PathBuf> {
        let layout = DatasetLayout::lookup(&dataset.provider, &dataset.dataset)?;
        Ok(self.data_root.join(layout.dir))
    }

    fn size_path(&self, metric: &str) -> PathBuf {
        self.size_dir.join(format!("{metric}.csv"))
    }

    fn read_observation_rows(path: &Path, dataset: &DatasetRef) -> Result<Vec<ObservationRow>> {
        if !path.is_file() {
            return Err(CoverageError::MissingDataset {
                what: "observation file",
                dataset: dataset.to_string(),
                path: path.display().to_string(),
            });
        }

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            let row: ObservationRow = result?;
            rows.push(row);
        }
        Ok(rows)
    }
}

fn matches_frequency(row: &ObservationRow, frequency: Frequency) -> bool {
    row.freq
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .is_none_or(|f| f.eq_ignore_ascii_case(frequency.code()))
}

impl DataSource for CsvDataStore {
    fn observations(
        &self,
        dataset: &DatasetRef,
        series_ids: &[String],
        frequency: Frequency,
    ) -> Result<ObservationTable> {
        let path = self.dataset_dir(dataset)?.join(format!("{}.csv", dataset.subdata));
        let rows = Self::read_observation_rows(&path, dataset)?;

        let requested: BTreeSet<&str> = series_ids.iter().map(String::as_str).collect();
        let mut present: BTreeSet<&str> = BTreeSet::new();
        let mut observations = Vec::new();
        let mut skipped = 0usize;

        for row in &rows {
            let series = row.indicator.as_str();
            if !requested.contains(series) || !matches_frequency(row, frequency) {
                continue;
            }
            present.insert(series);

            let Some(value) = row.value.filter(|v| v.is_finite()) else {
                skipped += 1;
                continue;
            };
            let period: Period = row.period.parse()?;
            observations.push(Observation {
                series_id: row.indicator.clone(),
                entity_id: row.ref_area.clone(),
                entity_label: row
                    .reference_area
                    .clone()
                    .filter(|l| !l.trim().is_empty()),
                period,
                value,
            });
        }

        let not_found: Vec<String> = series_ids
            .iter()
            .filter(|id| !present.contains(id.as_str()))
            .cloned()
            .collect();
        if !not_found.is_empty() {
            return Err(CoverageError::SeriesNotFound { not_found });
        }

        debug!(
            dataset = %dataset,
            path = %path.display(),
            observations = observations.len(),
            skipped,
            "Observations loaded"
        );
        Ok(ObservationTable::new(frequency, observations))
    }

    fn reference_entities(&self, dataset: &DatasetRef) -> Result<EntityList> {
        let layout = DatasetLayout::lookup(&dataset.provider, &dataset.dataset)?;
        let path = self.data_root.join(layout.dir).join(DATA_STRUCTURE_FILE);
        if !path.is_file() {
            return Err(CoverageError::MissingDataset {
                what: "data structure",
                dataset: dataset.to_string(),
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(&path)?;
        let structure: DataStructure = serde_json::from_str(&content).map_err(|e| CoverageError::Malformed {
            what: "data structure",
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let (codelist, entities) = structure
            .entities(|id| layout.is_entity_codelist(id))
            .ok_or_else(|| CoverageError::Malformed {
                what: "data structure",
                path: path.display().to_string(),
                reason: "no reference area code list".to_string(),
            })?;

        debug!(dataset = %dataset, codelist, entities = entities.len(), "Reference entities loaded");
        Ok(EntityList {
            code_system: layout.code_system,
            entities,
        })
    }

    fn size_ranking(&self, metric: &str) -> Result<SizeTable> {
        let path = self.size_path(metric);
        if !path.is_file() {
            return Err(CoverageError::MissingSizeData {
                metric: metric.to_string(),
                path: path.display().to_string(),
            });
        }
        let rows = size_table::read_rows(&path)?;
        Ok(size_table::to_size_table(metric, &rows))
    }

    fn crosswalk(&self) -> Result<Crosswalk> {
        let mut crosswalk = Crosswalk::new();

        let size_path = self.size_path(&self.size_metric);
        if size_path.is_file() {
            let rows = size_table::read_rows(&size_path)?;
            crosswalk.merge(size_table::crosswalk_from_rows(&rows));
        }
        if let Some(path) = &self.crosswalk_path {
            crosswalk.extend_from_csv(path)?;
        }

        if crosswalk.is_empty() {
            info!("Crosswalk is empty; crosswalked ids will be blank");
        }
        Ok(crosswalk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosswalk::CodeSystem;

    const OBSERVATIONS: &str = "\
indicator,ref_area,reference_area,period,value,freq
NGDP,FR,France,2010,1.5,A
NGDP,FR,France,2011,,A
NGDP,DE,Germany,2010,2.5,A
NGDP,DE,Germany,2010-Q1,0.5,Q
CPI,FR,France,2010,n/a,A
";

    fn store() -> (tempfile::TempDir, CsvDataStore) {
        let dir = tempfile::tempdir().unwrap();
        let ifs = dir.path().join("imf_ifs");
        fs::create_dir_all(&ifs).unwrap();
        fs::write(ifs.join("Test.csv"), OBSERVATIONS).unwrap();
        fs::write(
            ifs.join(DATA_STRUCTURE_FILE),
            r##"{"Structure": {"CodeLists": {"CodeList": [
                {"@id": "CL_AREA_IFS", "Code": [
                    {"@value": "FR", "Description": {"#text": "France"}},
                    {"@value": "DE", "Description": {"#text": "Germany"}}
                ]}
            ]}}}"##,
        )
        .unwrap();

        let config = Config::new(dir.path());
        let store = CsvDataStore::new(&config);
        (dir, store)
    }

    fn ifs() -> DatasetRef {
        DatasetRef::new("IMF", "IFS", "Test")
    }

    #[test]
    fn test_observations_filter_frequency_and_missing_values() {
        let (_dir, store) = store();
        let table = store
            .observations(&ifs(), &["NGDP".to_string()], Frequency::Annual)
            .unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].entity_label.as_deref(), Some("France"));

        let quarterly = store
            .observations(&ifs(), &["NGDP".to_string()], Frequency::Quarterly)
            .unwrap();
        assert_eq!(quarterly.rows.len(), 1);
        assert_eq!(quarterly.rows[0].period, Period::quarter(2010, 1).unwrap());
    }

    #[test]
    fn test_series_with_only_missing_values_resolves_empty() {
        let (_dir, store) = store();
        let table = store
            .observations(&ifs(), &["CPI".to_string()], Frequency::Annual)
            .unwrap();
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_unknown_series_are_listed() {
        let (_dir, store) = store();
        let err = store
            .observations(
                &ifs(),
                &["NGDP".to_string(), "X1".to_string(), "X2".to_string()],
                Frequency::Annual,
            )
            .unwrap_err();
        match err {
            CoverageError::SeriesNotFound { not_found } => assert_eq!(not_found, vec!["X1", "X2"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_subdata_file() {
        let (_dir, store) = store();
        let err = store
            .observations(&DatasetRef::new("IMF", "IFS", "Nope"), &["NGDP".to_string()], Frequency::Annual)
            .unwrap_err();
        assert!(matches!(err, CoverageError::MissingDataset { .. }));
    }

    #[test]
    fn test_reference_entities() {
        let (_dir, store) = store();
        let list = store.reference_entities(&ifs()).unwrap();
        assert_eq!(list.code_system, CodeSystem::Iso2);
        let ids: Vec<&str> = list.entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["FR", "DE"]);
    }

    #[test]
    fn test_unsupported_dataset() {
        let (_dir, store) = store();
        let err = store
            .reference_entities(&DatasetRef::new("OECD", "MEI", "x"))
            .unwrap_err();
        assert!(matches!(err, CoverageError::UnsupportedDataset { .. }));
    }

    #[test]
    fn test_missing_size_data() {
        let (_dir, store) = store();
        let err = store.size_ranking("NY.GDP.MKTP.CD").unwrap_err();
        match err {
            CoverageError::MissingSizeData { metric, path } => {
                assert_eq!(metric, "NY.GDP.MKTP.CD");
                assert!(path.ends_with("NY.GDP.MKTP.CD.csv"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_crosswalk_from_size_file() {
        let (dir, store) = store();
        let wdi = dir.path().join("wb_wdi");
        fs::create_dir_all(&wdi).unwrap();
        fs::write(
            wdi.join("NY.GDP.MKTP.CD.csv"),
            "cty_iso3,cty_iso2,cty_name,period,value\nFRA,FR,France,2022,2.8e12\n",
        )
        .unwrap();

        let crosswalk = store.crosswalk().unwrap();
        assert_eq!(
            crosswalk.convert("FR", CodeSystem::Iso2, CodeSystem::Iso3, Default::default()).as_deref(),
            Some("FRA")
        );
        let sizes = store.size_ranking("NY.GDP.MKTP.CD").unwrap();
        assert_eq!(sizes.records.len(), 1);
    }
}
