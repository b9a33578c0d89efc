//! Entity x period skeleton: the expected surface observations are matched against.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::coverage::types::{
    Entity, EntityList, EntityMeta, LastSize, ObservationTable, ReportLabel, SizeTable,
};
use crate::crosswalk::{CodeSystem, Crosswalk, Verbosity};
use crate::error::{CoverageError, Result};
use crate::ignore::DatasetIgnore;
use crate::period::Period;

/// Cross product of reference entities and observed periods, with per-entity size data.
///
/// Built once per check and only borrowed afterwards.
#[derive(Debug, Clone)]
pub struct Skeleton {
    entities: Vec<EntityMeta>,
    periods: Vec<Period>,
    entity_index: HashMap<String, usize>,
    period_index: HashMap<Period, usize>,
}

impl Skeleton {
    /// Builds the skeleton for `entities` x `periods`.
    ///
    /// Entities missing from `sizes` get `size_available = false` and a size of 0.
    /// Duplicate or empty entity ids are rejected.
    pub fn build(
        entities: &[Entity],
        periods: &[Period],
        sizes: &HashMap<String, LastSize>,
        label: &ReportLabel,
    ) -> Result<Self> {
        let mut metas = Vec::with_capacity(entities.len());
        let mut entity_index = HashMap::with_capacity(entities.len());

        for entity in entities {
            if entity.id.trim().is_empty() {
                return Err(CoverageError::EmptyKey {
                    field: "entity",
                    context: format!("reference list for {} ({})", label.series, label.frequency),
                });
            }
            if entity_index.insert(entity.id.clone(), metas.len()).is_some() {
                return Err(CoverageError::MergeCardinality {
                    series: label.series.clone(),
                    frequency: label.frequency.to_string(),
                    entity_id: entity.id.clone(),
                    period: "reference list".to_string(),
                });
            }

            let size = sizes.get(&entity.id);
            metas.push(EntityMeta {
                id: entity.id.clone(),
                description: entity.description.clone(),
                size_value: size.map(|s| s.value).unwrap_or(0.0),
                size_last_period: size.map(|s| s.period),
                size_available: size.is_some(),
            });
        }

        let periods: Vec<Period> = periods
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let period_index = periods.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        let skeleton = Self {
            entities: metas,
            periods,
            entity_index,
            period_index,
        };

        debug!(
            entities = skeleton.entities.len(),
            periods = skeleton.periods.len(),
            cells = skeleton.len(),
            with_size = skeleton.entities.iter().filter(|e| e.size_available).count(),
            "Skeleton built"
        );

        Ok(skeleton)
    }

    pub fn entities(&self) -> &[EntityMeta] {
        &self.entities
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn entity_position(&self, id: &str) -> Option<usize> {
        self.entity_index.get(id).copied()
    }

    pub fn period_position(&self, period: &Period) -> Option<usize> {
        self.period_index.get(period).copied()
    }

    /// Flat index of an (entity, period) cell.
    pub fn cell(&self, entity: usize, period: usize) -> usize {
        entity * self.periods.len() + period
    }

    /// Number of (entity, period) cells.
    pub fn len(&self) -> usize {
        self.entities.len() * self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every (entity, period) pair, entity-major.
    pub fn cells(&self) -> impl Iterator<Item = (&EntityMeta, Period)> + '_ {
        self.entities
            .iter()
            .flat_map(move |e| self.periods.iter().map(move |p| (e, *p)))
    }

    /// Sum of the size metric over every entity in the skeleton.
    pub fn total_size(&self) -> f64 {
        self.entities.iter().map(|e| e.size_value).sum()
    }
}

/// Latest non-missing size value per entity, keyed in the reference code system.
///
/// Records whose code cannot be crosswalked into `target` are dropped.
pub fn last_known_size(
    table: &SizeTable,
    crosswalk: &Crosswalk,
    target: CodeSystem,
    verbosity: Verbosity,
) -> HashMap<String, LastSize> {
    let mut out: HashMap<String, LastSize> = HashMap::new();
    let mut unmapped: BTreeSet<&str> = BTreeSet::new();

    for record in &table.records {
        let Some(value) = record.value.filter(|v| v.is_finite()) else {
            continue;
        };
        let Some(id) = crosswalk.convert(&record.entity_code, table.code_system, target, Verbosity::Quiet)
        else {
            unmapped.insert(record.entity_code.as_str());
            continue;
        };

        let candidate = LastSize {
            period: record.period,
            value,
        };
        out.entry(id)
            .and_modify(|current| {
                if candidate.period >= current.period {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }

    if !unmapped.is_empty() {
        match verbosity {
            Verbosity::Normal => info!(
                metric = %table.metric,
                count = unmapped.len(),
                "Size records without a {} code were skipped",
                target
            ),
            Verbosity::Quiet => debug!(
                metric = %table.metric,
                codes = ?unmapped,
                "Size records without a {} code were skipped",
                target
            ),
        }
    }

    out
}

/// Checks that every observed entity is in the reference list.
///
/// Entities matched by the ignore-list (on id or provider label) are returned so the
/// caller can drop their rows; any other unknown entity is an
/// [`CoverageError::UnmappedEntities`] error naming the series that carry it.
pub fn validate_observed_entities(
    table: &ObservationTable,
    reference: &EntityList,
    ignore: &DatasetIgnore,
    label: &ReportLabel,
) -> Result<BTreeSet<String>> {
    let known: BTreeSet<&str> = reference.entities.iter().map(|e| e.id.as_str()).collect();

    let mut ignored = BTreeSet::new();
    let mut unmapped = Vec::new();
    let mut unmapped_ids: BTreeSet<&str> = BTreeSet::new();

    for (id, entity_label) in table.entities() {
        if id.trim().is_empty() {
            return Err(CoverageError::EmptyKey {
                field: "entity",
                context: format!("observations of {} ({})", label.series, label.frequency),
            });
        }
        if known.contains(id) {
            continue;
        }
        if ignore.matches_any(std::iter::once(id).chain(entity_label)) {
            ignored.insert(id.to_string());
        } else {
            unmapped_ids.insert(id);
            unmapped.push(match entity_label {
                Some(l) => format!("{id} ({l})"),
                None => id.to_string(),
            });
        }
    }

    if !unmapped.is_empty() {
        let series: BTreeSet<&str> = table
            .rows
            .iter()
            .filter(|o| unmapped_ids.contains(o.entity_id.as_str()))
            .map(|o| o.series_id.as_str())
            .collect();
        return Err(CoverageError::UnmappedEntities {
            series: series.into_iter().collect::<Vec<_>>().join(", "),
            frequency: label.frequency.to_string(),
            entities: unmapped,
        });
    }

    if !ignored.is_empty() {
        debug!(ignored = ?ignored, "Dropping observations of ignored aggregates");
    }

    Ok(ignored)
}

/// Rejects entities that lack size data unless the ignore-list covers them.
pub fn ensure_ranked(skeleton: &Skeleton, ignore: &DatasetIgnore, label: &ReportLabel) -> Result<()> {
    let unranked: Vec<String> = skeleton
        .entities()
        .iter()
        .filter(|e| !e.size_available)
        .filter(|e| !ignore.matches_any([e.id.as_str(), e.description.as_str()]))
        .map(|e| format!("{} ({})", e.id, e.description))
        .collect();

    if unranked.is_empty() {
        Ok(())
    } else {
        Err(CoverageError::UnrankedEntities {
            series: label.series.clone(),
            frequency: label.frequency.to_string(),
            entities: unranked,
        })
    }
}
