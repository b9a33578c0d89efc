//! Data types used by the coverage pipeline.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::crosswalk::CodeSystem;
use crate::period::{Frequency, Period};

/// A reporting unit from the reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: String,
    pub description: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// The reference entity universe of a dataset and the code system its ids use.
#[derive(Debug, Clone)]
pub struct EntityList {
    pub code_system: CodeSystem,
    pub entities: Vec<Entity>,
}

/// A single observed value of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub series_id: String,
    pub entity_id: String,
    /// Provider's label for the entity, when the source carries one.
    pub entity_label: Option<String>,
    pub period: Period,
    pub value: f64,
}

/// Observations of one or more series of a dataset, all at one frequency.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    pub frequency: Frequency,
    pub rows: Vec<Observation>,
}

impl ObservationTable {
    pub fn new(frequency: Frequency, rows: Vec<Observation>) -> Self {
        Self { frequency, rows }
    }

    /// Keeps rows whose period falls in the inclusive `[start, end]` window.
    pub fn within(mut self, start: Option<Period>, end: Option<Period>) -> Self {
        self.rows.retain(|o| {
            start.is_none_or(|s| o.period >= s) && end.is_none_or(|e| o.period <= e)
        });
        self
    }

    /// Distinct periods present in the table, ascending.
    pub fn periods(&self) -> Vec<Period> {
        let set: BTreeSet<Period> = self.rows.iter().map(|o| o.period).collect();
        set.into_iter().collect()
    }

    /// Distinct entity ids with the first label seen for each.
    pub fn entities(&self) -> BTreeMap<&str, Option<&str>> {
        let mut out: BTreeMap<&str, Option<&str>> = BTreeMap::new();
        for o in &self.rows {
            let label = out.entry(o.entity_id.as_str()).or_insert(None);
            if label.is_none() {
                *label = o.entity_label.as_deref();
            }
        }
        out
    }

    pub fn series_ids(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|o| o.series_id.as_str()).collect()
    }

    /// Splits rows per series id, preserving row order within each series.
    pub fn split_by_series(self) -> HashMap<String, Vec<Observation>> {
        let mut out: HashMap<String, Vec<Observation>> = HashMap::new();
        for o in self.rows {
            out.entry(o.series_id.clone()).or_default().push(o);
        }
        out
    }
}

/// One value of the size metric for one entity, in the size table's code system.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeRecord {
    pub entity_code: String,
    pub period: Period,
    pub value: Option<f64>,
}

/// The size metric (GDP) used to rank entities.
#[derive(Debug, Clone)]
pub struct SizeTable {
    pub metric: String,
    pub code_system: CodeSystem,
    pub records: Vec<SizeRecord>,
}

/// Latest size value known for an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastSize {
    pub period: Period,
    pub value: f64,
}

/// Per-entity metadata carried by the skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMeta {
    pub id: String,
    pub description: String,
    pub size_value: f64,
    pub size_last_period: Option<Period>,
    pub size_available: bool,
}

/// Series and frequency a pass is working on; used in error messages.
#[derive(Debug, Clone)]
pub struct ReportLabel {
    pub series: String,
    pub frequency: Frequency,
}

impl ReportLabel {
    pub fn new(series: impl Into<String>, frequency: Frequency) -> Self {
        Self {
            series: series.into(),
            frequency,
        }
    }
}

/// Coverage of one entity for one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRow {
    pub entity_id: String,
    /// The entity id in the alternate code system (ISO3 for ISO2-keyed data).
    pub entity_id_crosswalked: Option<String>,
    pub description: String,
    pub size_value: f64,
    pub size_last_period: Option<Period>,
    pub size_available: bool,
    /// Years' worth of periods reported, aligned with [`CoverageTable::decades`].
    pub decades: Vec<f64>,
    pub percentage_reported: f64,
}

impl CoverageRow {
    pub fn decade_total(&self) -> f64 {
        self.decades.iter().sum()
    }
}

/// Coverage rows of one series, sorted by size descending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageTable {
    pub series_id: String,
    pub frequency: Frequency,
    /// Output column name of the crosswalked id, e.g. `cty_iso3`.
    pub crosswalk_column: String,
    pub decades: Vec<i32>,
    pub rows: Vec<CoverageRow>,
}

/// Size-weighted reporting summary of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub series_id: String,
    pub mean_weighted_reported_percentage: f64,
    pub entity_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeriesReport {
    Table(CoverageTable),
    Summary(CoverageSummary),
}

impl SeriesReport {
    pub fn series_id(&self) -> &str {
        match self {
            SeriesReport::Table(t) => &t.series_id,
            SeriesReport::Summary(s) => &s.series_id,
        }
    }

    pub fn as_table(&self) -> Option<&CoverageTable> {
        match self {
            SeriesReport::Table(t) => Some(t),
            SeriesReport::Summary(_) => None,
        }
    }

    pub fn as_summary(&self) -> Option<&CoverageSummary> {
        match self {
            SeriesReport::Summary(s) => Some(s),
            SeriesReport::Table(_) => None,
        }
    }
}

/// Reports for one series, or for several in the order they were requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CoverageReports {
    Single(SeriesReport),
    BySeries(Vec<SeriesReport>),
}

impl CoverageReports {
    /// The report for `series_id`, if present.
    pub fn get(&self, series_id: &str) -> Option<&SeriesReport> {
        match self {
            CoverageReports::Single(report) => Some(report).filter(|r| r.series_id() == series_id),
            CoverageReports::BySeries(reports) => reports.iter().find(|r| r.series_id() == series_id),
        }
    }

    /// Series ids in report order.
    pub fn series_ids(&self) -> Vec<&str> {
        match self {
            CoverageReports::Single(report) => vec![report.series_id()],
            CoverageReports::BySeries(reports) => reports.iter().map(SeriesReport::series_id).collect(),
        }
    }
}

/// Result of a reporting check, including requested ids that did not resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub reports: CoverageReports,
    pub not_found: Vec<String>,
}
