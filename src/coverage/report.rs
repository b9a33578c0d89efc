//! Percentage-reported computation, filtering and final row formatting.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::coverage::types::{CoverageRow, CoverageSummary};
use crate::coverage::utility::{round2, weighted_sum};
use crate::crosswalk::{CodeSystem, Crosswalk, Verbosity};

/// Sets `percentage_reported` relative to the best-covered entity.
///
/// `percentage = sum(decades) / max over rows of sum(decades)`, rounded to two
/// decimals. When no entity reported anything every percentage is 0.
pub fn compute_percentages(rows: &mut [CoverageRow]) {
    let best = rows
        .iter()
        .map(CoverageRow::decade_total)
        .fold(0.0_f64, f64::max);

    for row in rows.iter_mut() {
        row.percentage_reported = if best > 0.0 {
            round2(row.decade_total() / best)
        } else {
            0.0
        };
    }
}

/// Drops rows whose percentage is strictly above `threshold`.
///
/// Rows at exactly the threshold are kept, so `Some(1.0)` keeps everything.
pub fn apply_threshold(rows: Vec<CoverageRow>, threshold: Option<f64>) -> Vec<CoverageRow> {
    let Some(threshold) = threshold else {
        return rows;
    };
    let before = rows.len();
    let kept: Vec<CoverageRow> = rows
        .into_iter()
        .filter(|r| r.percentage_reported <= threshold)
        .collect();
    debug!(threshold, before, after = kept.len(), "Reporting threshold applied");
    kept
}

/// Keeps only entities with size data unless `include_all` is set.
pub fn restrict_to_ranked(rows: Vec<CoverageRow>, include_all: bool, verbosity: Verbosity) -> Vec<CoverageRow> {
    if include_all {
        return rows;
    }
    match verbosity {
        Verbosity::Normal => info!(
            "Reporting entities with size data available. To see all entities, set include_all_entities (--all)."
        ),
        Verbosity::Quiet => debug!("Restricting to entities with size data available"),
    }
    rows.into_iter().filter(|r| r.size_available).collect()
}

/// Sorts descending by size value, ties broken by entity id.
pub fn sort_by_size(rows: &mut [CoverageRow]) {
    rows.sort_by(|a, b| {
        b.size_value
            .partial_cmp(&a.size_value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
}

/// Fills the alternate-code column and any empty description from the crosswalk.
pub fn crosswalk_ids(rows: &mut [CoverageRow], crosswalk: &Crosswalk, codes: CodeSystem, verbosity: Verbosity) {
    for row in rows.iter_mut() {
        row.entity_id_crosswalked = crosswalk.convert(&row.entity_id, codes, codes.alternate(), verbosity);
        if row.description.trim().is_empty() {
            if let Some(name) = crosswalk.name(&row.entity_id) {
                row.description = name.to_string();
            }
        }
    }
}

/// Size-weighted mean of the percentage reported.
///
/// Each row is weighted by its size over `total_size`, the size summed across
/// every entity in the skeleton. Entities without size data weigh nothing.
pub fn summarize(series_id: &str, rows: &[CoverageRow], total_size: f64) -> CoverageSummary {
    let mean = if total_size > 0.0 {
        let values: Vec<f64> = rows.iter().map(|r| r.percentage_reported).collect();
        let weights: Vec<f64> = rows.iter().map(|r| r.size_value / total_size).collect();
        weighted_sum(&values, &weights)
    } else {
        0.0
    };

    CoverageSummary {
        series_id: series_id.to_string(),
        mean_weighted_reported_percentage: mean,
        entity_count: rows.len(),
    }
}
