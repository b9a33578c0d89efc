//! One-to-one merge of observations onto the skeleton and per-decade aggregation.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::coverage::skeleton::Skeleton;
use crate::coverage::types::{CoverageRow, Observation, ReportLabel};
use crate::coverage::utility::round2;
use crate::error::{CoverageError, Result};
use crate::period::Frequency;

/// Match outcome of every skeleton cell for one series.
#[derive(Debug, Clone)]
pub struct MergedPanel {
    reported: Vec<bool>,
}

impl MergedPanel {
    pub fn is_reported(&self, cell: usize) -> bool {
        self.reported[cell]
    }

    pub fn matched(&self) -> usize {
        self.reported.iter().filter(|r| **r).count()
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }
}

/// Outer-joins one series' observations onto the skeleton on (entity, period).
///
/// The join must be one-to-one: a second observation for the same cell is a
/// [`CoverageError::MergeCardinality`] error and an observation with no skeleton cell is a
/// [`CoverageError::UnmatchedObservation`] error.
pub fn merge_observations(
    observations: &[Observation],
    skeleton: &Skeleton,
    label: &ReportLabel,
) -> Result<MergedPanel> {
    ensure_single_series(observations)?;

    let mut reported = vec![false; skeleton.len()];

    for o in observations {
        if o.entity_id.trim().is_empty() {
            return Err(CoverageError::EmptyKey {
                field: "entity",
                context: format!("observations of {} ({})", label.series, label.frequency),
            });
        }

        let cell = skeleton
            .entity_position(&o.entity_id)
            .zip(skeleton.period_position(&o.period))
            .map(|(e, p)| skeleton.cell(e, p))
            .ok_or_else(|| CoverageError::UnmatchedObservation {
                series: label.series.clone(),
                frequency: label.frequency.to_string(),
                entity_id: o.entity_id.clone(),
                period: o.period.to_string(),
            })?;

        if std::mem::replace(&mut reported[cell], true) {
            return Err(CoverageError::MergeCardinality {
                series: label.series.clone(),
                frequency: label.frequency.to_string(),
                entity_id: o.entity_id.clone(),
                period: o.period.to_string(),
            });
        }
    }

    let panel = MergedPanel { reported };
    debug!(
        series = %label.series,
        cells = panel.len(),
        matched = panel.matched(),
        "Observations merged onto skeleton"
    );
    Ok(panel)
}

fn ensure_single_series(observations: &[Observation]) -> Result<()> {
    let series: BTreeSet<&str> = observations.iter().map(|o| o.series_id.as_str()).collect();
    if series.len() > 1 {
        return Err(CoverageError::MixedSeries {
            series: series.into_iter().map(str::to_string).collect(),
        });
    }
    Ok(())
}

/// Decade columns for each skeleton entity, in skeleton order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecadeTable {
    pub decades: Vec<i32>,
    pub rows: Vec<DecadeRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecadeRow {
    pub entity_id: String,
    /// Years' worth of reported periods, aligned with [`DecadeTable::decades`].
    pub values: Vec<f64>,
}

/// Collapses the merged panel to one value per (entity, decade).
///
/// Each value is the count of reported periods divided by the frequency's
/// annualization factor, rounded to two decimals. Decades with no reports are 0.
pub fn aggregate_by_decade(panel: &MergedPanel, skeleton: &Skeleton, frequency: Frequency) -> DecadeTable {
    let decades: Vec<i32> = skeleton
        .periods()
        .iter()
        .map(|p| p.decade())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let decade_slot: HashMap<i32, usize> = decades.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let period_slots: Vec<usize> = skeleton
        .periods()
        .iter()
        .map(|p| decade_slot[&p.decade()])
        .collect();

    let to_year = f64::from(frequency.to_year());

    let rows = skeleton
        .entities()
        .iter()
        .enumerate()
        .map(|(e, meta)| {
            let mut counts = vec![0u32; decades.len()];
            for (p, slot) in period_slots.iter().enumerate() {
                if panel.is_reported(skeleton.cell(e, p)) {
                    counts[*slot] += 1;
                }
            }
            DecadeRow {
                entity_id: meta.id.clone(),
                values: counts.iter().map(|c| round2(f64::from(*c) / to_year)).collect(),
            }
        })
        .collect();

    DecadeTable { decades, rows }
}

/// Joins decade rows back to the skeleton's entity metadata.
///
/// The join must match every row to exactly one entity and cover every entity;
/// anything else means the aggregation dropped or duplicated entities.
pub fn attach_metadata(table: DecadeTable, skeleton: &Skeleton, label: &ReportLabel) -> Result<Vec<CoverageRow>> {
    let mismatch = |detail: String| CoverageError::AggregationMismatch {
        series: label.series.clone(),
        frequency: label.frequency.to_string(),
        detail,
    };

    let mut used = vec![false; skeleton.entities().len()];
    let mut rows = Vec::with_capacity(table.rows.len());

    for row in table.rows {
        let idx = skeleton
            .entity_position(&row.entity_id)
            .ok_or_else(|| mismatch(format!("entity {} has no metadata", row.entity_id)))?;
        if std::mem::replace(&mut used[idx], true) {
            return Err(mismatch(format!("entity {} appears twice", row.entity_id)));
        }
        if row.values.len() != table.decades.len() {
            return Err(mismatch(format!(
                "entity {} has {} decade values, expected {}",
                row.entity_id,
                row.values.len(),
                table.decades.len()
            )));
        }

        let meta = &skeleton.entities()[idx];
        rows.push(CoverageRow {
            entity_id: meta.id.clone(),
            entity_id_crosswalked: None,
            description: meta.description.clone(),
            size_value: meta.size_value,
            size_last_period: meta.size_last_period,
            size_available: meta.size_available,
            decades: row.values,
            percentage_reported: 0.0,
        });
    }

    let missing = used.iter().filter(|u| !**u).count();
    if missing > 0 {
        return Err(mismatch(format!("{missing} entities missing from the decade table")));
    }

    Ok(rows)
}
