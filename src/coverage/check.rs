//! Orchestrates a reporting check across one or more series.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::coverage::aggregate::{aggregate_by_decade, attach_metadata, merge_observations};
use crate::coverage::report::{
    apply_threshold, compute_percentages, crosswalk_ids, restrict_to_ranked, sort_by_size, summarize,
};
use crate::coverage::skeleton::{Skeleton, ensure_ranked, last_known_size, validate_observed_entities};
use crate::coverage::types::{
    CheckOutcome, CoverageReports, CoverageTable, Observation, ObservationTable, ReportLabel, SeriesReport,
};
use crate::crosswalk::{CodeSystem, Crosswalk, Verbosity};
use crate::error::{CoverageError, Result};
use crate::ignore::IgnoreList;
use crate::period::{Frequency, Period};
use crate::services::{DataSource, DatasetRef};

/// What to check and how to present it.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub dataset: DatasetRef,
    pub series: Vec<String>,
    pub frequency: Frequency,
    /// Return a size-weighted summary per series instead of the table.
    pub summarized: bool,
    /// Drop entities whose percentage reported is above this value.
    pub report_percen: Option<f64>,
    pub start: Option<Period>,
    pub end: Option<Period>,
    /// Show entities without size data too.
    pub include_all_entities: bool,
    /// Fail when a reference entity has no size data and is not on the ignore-list.
    pub strict_size: bool,
}

impl CheckRequest {
    pub fn new(dataset: DatasetRef, series: Vec<String>, frequency: Frequency) -> Self {
        Self {
            dataset,
            series,
            frequency,
            summarized: false,
            report_percen: None,
            start: None,
            end: None,
            include_all_entities: false,
            strict_size: false,
        }
    }

    fn threshold(&self) -> Option<f64> {
        if self.summarized {
            Some(1.0)
        } else {
            self.report_percen
        }
    }
}

/// Runs reporting checks against a [`DataSource`].
pub struct ReportingChecker<'a, S: DataSource + ?Sized> {
    source: &'a S,
    ignore: &'a IgnoreList,
    size_metric: String,
}

/// Inputs shared by every per-series pass of one check.
struct SharedInputs<'a> {
    skeleton: &'a Skeleton,
    crosswalk: &'a Crosswalk,
    codes: CodeSystem,
    verbosity: Verbosity,
}

impl<'a, S: DataSource + ?Sized> ReportingChecker<'a, S> {
    pub fn new(source: &'a S, ignore: &'a IgnoreList, size_metric: impl Into<String>) -> Self {
        Self {
            source,
            ignore,
            size_metric: size_metric.into(),
        }
    }

    /// Builds the skeleton once and produces one report per resolvable series.
    ///
    /// A single resolved series yields [`CoverageReports::Single`]; several yield
    /// [`CoverageReports::BySeries`] in request order.
    #[tracing::instrument(
        skip(self, request),
        fields(dataset = %request.dataset, frequency = %request.frequency, requested = request.series.len())
    )]
    pub fn run(&self, request: &CheckRequest) -> Result<CheckOutcome> {
        let requested = dedup_preserving_order(&request.series);
        if requested.is_empty() {
            return Err(CoverageError::NoSeriesRequested);
        }

        if request.summarized && request.report_percen.is_some_and(|p| p != 1.0) {
            info!("Setting report_percen = 1 as a summarized report was requested");
        }

        let (table, resolved, not_found) = self.fetch_resolvable(request, &requested)?;
        let mut table = table.within(request.start, request.end);
        let frequency = request.frequency;
        let verbosity = if resolved.len() == 1 {
            Verbosity::Normal
        } else {
            Verbosity::Quiet
        };

        let reference = self.source.reference_entities(&request.dataset)?;
        let size_table = self.source.size_ranking(&self.size_metric)?;
        let crosswalk = self.source.crosswalk()?;
        let ignore = self
            .ignore
            .for_dataset(&request.dataset.provider, &request.dataset.dataset);

        let check_label = ReportLabel::new(resolved.join(", "), frequency);
        let ignored = validate_observed_entities(&table, &reference, &ignore, &check_label)?;
        table.rows.retain(|o| !ignored.contains(&o.entity_id));
        debug!(
            observations = table.rows.len(),
            series_with_data = table.series_ids().len(),
            ignore_patterns = ignore.len(),
            ignored = ignored.len(),
            "Observations validated against reference entities"
        );

        let periods = table.periods();
        let sizes = last_known_size(&size_table, &crosswalk, reference.code_system, verbosity);
        let skeleton = Skeleton::build(&reference.entities, &periods, &sizes, &check_label)?;
        if request.strict_size {
            ensure_ranked(&skeleton, &ignore, &check_label)?;
        }

        let mut by_series = table.split_by_series();
        let shared = SharedInputs {
            skeleton: &skeleton,
            crosswalk: &crosswalk,
            codes: reference.code_system,
            verbosity,
        };

        let mut reports = Vec::with_capacity(resolved.len());
        for series_id in &resolved {
            let observations = by_series.remove(series_id).unwrap_or_default();

            let report = self
                .report_series(series_id, frequency, &observations, &shared, request)
                .inspect_err(|e| {
                    if verbosity == Verbosity::Normal {
                        error!(series = %series_id, error = %e, "Reporting check failed");
                    }
                })?;
            reports.push(report);
        }

        let reports = if resolved.len() == 1 {
            match reports.pop() {
                Some(report) => CoverageReports::Single(report),
                None => return Err(CoverageError::SeriesNotFound { not_found: requested }),
            }
        } else {
            CoverageReports::BySeries(reports)
        };

        Ok(CheckOutcome { reports, not_found })
    }

    /// Fetches observations, retrying with the resolvable subset when some of
    /// several requested ids are unknown.
    fn fetch_resolvable(
        &self,
        request: &CheckRequest,
        requested: &[String],
    ) -> Result<(ObservationTable, Vec<String>, Vec<String>)> {
        match self
            .source
            .observations(&request.dataset, requested, request.frequency)
        {
            Ok(table) => Ok((table, requested.to_vec(), Vec::new())),
            Err(CoverageError::SeriesNotFound { not_found }) if requested.len() > 1 => {
                let remaining: Vec<String> = requested
                    .iter()
                    .filter(|s| !not_found.contains(s))
                    .cloned()
                    .collect();
                if remaining.is_empty() {
                    return Err(CoverageError::SeriesNotFound {
                        not_found: requested.to_vec(),
                    });
                }

                warn!(not_found = ?not_found, "Series not found. Skipping...");
                let table = self
                    .source
                    .observations(&request.dataset, &remaining, request.frequency)?;
                Ok((table, remaining, not_found))
            }
            Err(e) => Err(e),
        }
    }

    fn report_series(
        &self,
        series_id: &str,
        frequency: Frequency,
        observations: &[Observation],
        shared: &SharedInputs<'_>,
        request: &CheckRequest,
    ) -> Result<SeriesReport> {
        let label = ReportLabel::new(series_id, frequency);

        let panel = merge_observations(observations, shared.skeleton, &label)?;
        let decade_table = aggregate_by_decade(&panel, shared.skeleton, frequency);
        let decades = decade_table.decades.clone();

        let mut rows = attach_metadata(decade_table, shared.skeleton, &label)?;
        compute_percentages(&mut rows);
        let mut rows = apply_threshold(rows, request.threshold());
        crosswalk_ids(&mut rows, shared.crosswalk, shared.codes, shared.verbosity);
        sort_by_size(&mut rows);

        if request.summarized {
            let summary = summarize(series_id, &rows, shared.skeleton.total_size());
            debug!(
                series = series_id,
                mean = summary.mean_weighted_reported_percentage,
                entities = summary.entity_count,
                "Series summarized"
            );
            return Ok(SeriesReport::Summary(summary));
        }

        let rows = restrict_to_ranked(rows, request.include_all_entities, shared.verbosity);
        debug!(
            series = series_id,
            rows = rows.len(),
            observations = observations.len(),
            "Series coverage table built"
        );

        Ok(SeriesReport::Table(CoverageTable {
            series_id: series_id.to_string(),
            frequency,
            crosswalk_column: shared.codes.alternate().label().to_string(),
            decades,
            rows,
        }))
    }
}

fn dedup_preserving_order(series: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    series
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::types::{Entity, EntityList, SizeRecord, SizeTable};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory source for orchestrator tests.
    struct FixtureSource {
        observations: Vec<Observation>,
        entities: Vec<Entity>,
        sizes: Option<Vec<SizeRecord>>,
        /// Ids that resolve even without observations.
        empty_series: Vec<String>,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl FixtureSource {
        fn new(observations: Vec<Observation>) -> Self {
            let mut sizes = Vec::new();
            for (iso3, value) in [("AAA", 300.0), ("BBB", 100.0)] {
                sizes.push(SizeRecord {
                    entity_code: iso3.to_string(),
                    period: Period::annual(2022).unwrap(),
                    value: Some(value),
                });
            }
            Self {
                observations,
                entities: vec![
                    Entity::new("A", "Alpha"),
                    Entity::new("B", "Beta"),
                    Entity::new("C", "Gamma"),
                ],
                sizes: Some(sizes),
                empty_series: Vec::new(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl DataSource for FixtureSource {
        fn observations(
            &self,
            _dataset: &DatasetRef,
            series_ids: &[String],
            frequency: Frequency,
        ) -> Result<ObservationTable> {
            self.calls.borrow_mut().push(series_ids.to_vec());
            let not_found: Vec<String> = series_ids
                .iter()
                .filter(|id| !self.empty_series.contains(id))
                .filter(|id| !self.observations.iter().any(|o| &o.series_id == *id))
                .cloned()
                .collect();
            if !not_found.is_empty() {
                return Err(CoverageError::SeriesNotFound { not_found });
            }
            let rows = self
                .observations
                .iter()
                .filter(|o| series_ids.contains(&o.series_id))
                .cloned()
                .collect();
            Ok(ObservationTable::new(frequency, rows))
        }

        fn reference_entities(&self, _dataset: &DatasetRef) -> Result<EntityList> {
            Ok(EntityList {
                code_system: CodeSystem::Iso2,
                entities: self.entities.clone(),
            })
        }

        fn size_ranking(&self, metric: &str) -> Result<SizeTable> {
            match &self.sizes {
                Some(records) => Ok(SizeTable {
                    metric: metric.to_string(),
                    code_system: CodeSystem::Iso3,
                    records: records.clone(),
                }),
                None => Err(CoverageError::MissingSizeData {
                    metric: metric.to_string(),
                    path: "fixture".to_string(),
                }),
            }
        }

        fn crosswalk(&self) -> Result<Crosswalk> {
            let mut cw = Crosswalk::new();
            cw.insert("A", "AAA", Some("Alpha"));
            cw.insert("B", "BBB", Some("Beta"));
            cw.insert("C", "CCC", Some("Gamma"));
            Ok(cw)
        }
    }

    fn obs(series: &str, entity: &str, year: i32) -> Observation {
        Observation {
            series_id: series.to_string(),
            entity_id: entity.to_string(),
            entity_label: None,
            period: Period::annual(year).unwrap(),
            value: 1.0,
        }
    }

    fn request(series: &[&str]) -> CheckRequest {
        CheckRequest::new(
            DatasetRef::new("IMF", "IFS", "Test"),
            series.iter().map(|s| s.to_string()).collect(),
            Frequency::Annual,
        )
    }

    fn scenario_observations() -> Vec<Observation> {
        vec![
            obs("S1", "A", 2010),
            obs("S1", "A", 2011),
            obs("S1", "B", 2013),
            obs("S2", "A", 2010),
            obs("S3", "B", 2012),
        ]
    }

    fn single_table(outcome: &CheckOutcome) -> &CoverageTable {
        match &outcome.reports {
            CoverageReports::Single(report) => report.as_table().expect("table report"),
            other => panic!("expected a single report, got {other:?}"),
        }
    }

    #[test]
    fn test_single_series_returns_table_sorted_by_size() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let mut req = request(&["S1"]);
        req.include_all_entities = true;
        let outcome = checker.run(&req).unwrap();
        let table = single_table(&outcome);

        assert_eq!(table.decades, vec![2010]);
        assert_eq!(table.crosswalk_column, "cty_iso3");
        let ids: Vec<&str> = table.rows.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);

        let a = &table.rows[0];
        assert_eq!(a.entity_id_crosswalked.as_deref(), Some("AAA"));
        assert_eq!(a.decades, vec![2.0]);
        assert_eq!(a.percentage_reported, 1.0);
        assert_eq!(table.rows[1].percentage_reported, 0.5);
        assert_eq!(table.rows[2].percentage_reported, 0.0);
    }

    #[test]
    fn test_default_view_hides_entities_without_size() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let outcome = checker.run(&request(&["S1"])).unwrap();
        let table = single_table(&outcome);
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows.iter().all(|r| r.size_available));
    }

    #[test]
    fn test_threshold_filters_rows() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let mut req = request(&["S1"]);
        req.include_all_entities = true;
        req.report_percen = Some(0.5);
        let outcome = checker.run(&req).unwrap();
        let ids: Vec<&str> = single_table(&outcome)
            .rows
            .iter()
            .map(|r| r.entity_id.as_str())
            .collect();
        assert_eq!(ids, vec!["B", "C"]);
    }

    #[test]
    fn test_multiple_series_skip_unknown_ids() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let outcome = checker.run(&request(&["S1", "NOPE", "S2"])).unwrap();
        assert_eq!(outcome.not_found, vec!["NOPE".to_string()]);
        match &outcome.reports {
            CoverageReports::BySeries(_) => {
                assert_eq!(outcome.reports.series_ids(), vec!["S1", "S2"]);
            }
            other => panic!("expected per-series reports, got {other:?}"),
        }
        assert_eq!(source.calls.borrow().len(), 2);
        assert_eq!(source.calls.borrow()[1], vec!["S1".to_string(), "S2".to_string()]);
    }

    #[test]
    fn test_all_ids_unknown_raises_with_full_list() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let err = checker.run(&request(&["X1", "X2"])).unwrap_err();
        match err {
            CoverageError::SeriesNotFound { not_found } => {
                assert_eq!(not_found, vec!["X1".to_string(), "X2".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_single_unknown_id_raises() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let err = checker.run(&request(&["X1"])).unwrap_err();
        assert!(matches!(err, CoverageError::SeriesNotFound { .. }));
        assert_eq!(source.calls.borrow().len(), 1);
    }

    #[test]
    fn test_reports_follow_request_order() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let outcome = checker.run(&request(&["S3", "S1"])).unwrap();
        assert_eq!(outcome.reports.series_ids(), vec!["S3", "S1"]);

        let json = serde_json::to_value(&outcome.reports).unwrap();
        let ids: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["series_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["S3", "S1"]);
    }

    #[test]
    fn test_series_without_observations_reports_zeros() {
        let mut source = FixtureSource::new(vec![obs("S1", "A", 2010), obs("S1", "A", 2021)]);
        source.empty_series = vec!["S2".to_string()];
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let mut req = request(&["S1", "S2"]);
        req.include_all_entities = true;
        let outcome = checker.run(&req).unwrap();
        assert!(outcome.not_found.is_empty());

        let s2 = outcome.reports.get("S2").and_then(SeriesReport::as_table).unwrap();
        assert_eq!(s2.decades, vec![2010, 2020]);
        assert_eq!(s2.rows.len(), 3);
        assert!(s2.rows.iter().all(|r| r.decades == vec![0.0, 0.0]));
        assert!(s2.rows.iter().all(|r| r.percentage_reported == 0.0));

        let s1 = outcome.reports.get("S1").and_then(SeriesReport::as_table).unwrap();
        let a = s1.rows.iter().find(|r| r.entity_id == "A").unwrap();
        assert_eq!(a.decades, vec![1.0, 1.0]);
        assert_eq!(a.percentage_reported, 1.0);
    }

    #[test]
    fn test_lone_series_without_observations_has_no_decades() {
        let mut source = FixtureSource::new(scenario_observations());
        source.empty_series = vec!["S9".to_string()];
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let mut req = request(&["S9"]);
        req.include_all_entities = true;
        let outcome = checker.run(&req).unwrap();
        let table = single_table(&outcome);

        assert!(table.decades.is_empty());
        assert_eq!(table.rows.len(), 3);
        assert!(table.rows.iter().all(|r| r.decades.is_empty()));
        assert!(table.rows.iter().all(|r| r.percentage_reported == 0.0));
    }

    #[test]
    fn test_shared_skeleton_spans_all_series_periods() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let mut req = request(&["S2", "S3"]);
        req.include_all_entities = true;
        let outcome = checker.run(&req).unwrap();
        let s2 = outcome.reports.get("S2").and_then(SeriesReport::as_table).unwrap();
        assert_eq!(s2.decades, vec![2010]);
        let a = s2.rows.iter().find(|r| r.entity_id == "A").unwrap();
        assert_eq!(a.decades, vec![1.0]);
    }

    #[test]
    fn test_summarized_mode() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let mut req = request(&["S1"]);
        req.summarized = true;
        req.report_percen = Some(0.1);
        let outcome = checker.run(&req).unwrap();
        let CoverageReports::Single(report) = &outcome.reports else {
            panic!("expected a single report");
        };
        let summary = report.as_summary().unwrap();
        // A: 1.0 * 300/400, B: 0.5 * 100/400, C weighs nothing.
        assert!((summary.mean_weighted_reported_percentage - 0.875).abs() < 1e-12);
        assert_eq!(summary.entity_count, 3);
    }

    #[test]
    fn test_missing_size_data_fails_fast() {
        let mut source = FixtureSource::new(scenario_observations());
        source.sizes = None;
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let err = checker.run(&request(&["S1"])).unwrap_err();
        assert!(matches!(err, CoverageError::MissingSizeData { .. }));
    }

    #[test]
    fn test_unmapped_entity_is_fatal_unless_ignored() {
        let mut observations = scenario_observations();
        observations.push(obs("S1", "WLD", 2010));
        let source = FixtureSource::new(observations);

        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");
        let err = checker.run(&request(&["S1"])).unwrap_err();
        assert!(matches!(err, CoverageError::UnmappedEntities { .. }));

        let ignore: IgnoreList = serde_json::from_str::<HashMap<String, HashMap<String, Vec<String>>>>(
            r#"{"IMF": {"IFS": ["WLD"]}}"#,
        )
        .map(IgnoreList::from)
        .unwrap();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");
        let mut req = request(&["S1"]);
        req.include_all_entities = true;
        let outcome = checker.run(&req).unwrap();
        assert_eq!(single_table(&outcome).rows.len(), 3);
    }

    #[test]
    fn test_strict_size_rejects_unranked_entities() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let mut req = request(&["S1"]);
        req.strict_size = true;
        let err = checker.run(&req).unwrap_err();
        assert!(matches!(err, CoverageError::UnrankedEntities { .. }));
    }

    #[test]
    fn test_window_restricts_periods() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let mut req = request(&["S1"]);
        req.include_all_entities = true;
        req.start = Period::annual(2011);
        let outcome = checker.run(&req).unwrap();
        let table = single_table(&outcome);
        let a = table.rows.iter().find(|r| r.entity_id == "A").unwrap();
        assert_eq!(a.decades, vec![1.0]);
    }

    #[test]
    fn test_run_is_idempotent() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let req = request(&["S1", "S2", "S3"]);
        assert_eq!(checker.run(&req).unwrap(), checker.run(&req).unwrap());
    }

    #[test]
    fn test_no_series_requested() {
        let source = FixtureSource::new(scenario_observations());
        let ignore = IgnoreList::default();
        let checker = ReportingChecker::new(&source, &ignore, "GDP");

        let err = checker.run(&request(&[" ", ""])).unwrap_err();
        assert!(matches!(err, CoverageError::NoSeriesRequested));
    }

    #[test]
    fn test_dedup_preserving_order() {
        let input = vec!["B".to_string(), "A".to_string(), "B".to_string(), " A ".to_string()];
        assert_eq!(dedup_preserving_order(&input), vec!["B".to_string(), "A".to_string()]);
    }
}
