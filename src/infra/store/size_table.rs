//! On-disk size metric table (`{root}/wb_wdi/{metric}.csv`).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coverage::types::{SizeRecord, SizeTable};
use crate::crosswalk::{CodeSystem, Crosswalk};
use crate::error::Result;
use crate::period::Period;

/// One row of the size CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRow {
    pub cty_iso3: String,
    #[serde(default)]
    pub cty_iso2: String,
    #[serde(default)]
    pub cty_name: String,
    pub period: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub value: Option<f64>,
}

pub fn read_rows(path: &Path) -> Result<Vec<SizeRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: SizeRow = result?;
        rows.push(row);
    }
    debug!(path = %path.display(), rows = rows.len(), "Size table read");
    Ok(rows)
}

/// Writes rows with headers, replacing any existing file.
pub fn write_rows(path: &Path, rows: &[SizeRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "Size table written");
    Ok(())
}

/// ISO3-keyed [`SizeTable`] from raw rows.
///
/// Rows without an ISO3 code or with an unreadable period are skipped.
pub fn to_size_table(metric: &str, rows: &[SizeRow]) -> SizeTable {
    let mut skipped = 0usize;
    let records = rows
        .iter()
        .filter_map(|row| {
            let code = row.cty_iso3.trim();
            let period = row.period.parse::<Period>().ok();
            match (code.is_empty(), period) {
                (false, Some(period)) => Some(SizeRecord {
                    entity_code: code.to_ascii_uppercase(),
                    period,
                    value: row.value,
                }),
                _ => {
                    skipped += 1;
                    None
                }
            }
        })
        .collect();

    if skipped > 0 {
        warn!(metric, skipped, "Size rows without an ISO3 code or a valid period were skipped");
    }

    SizeTable {
        metric: metric.to_string(),
        code_system: CodeSystem::Iso3,
        records,
    }
}

/// ISO2/ISO3/name pairs carried by the size rows.
pub fn crosswalk_from_rows(rows: &[SizeRow]) -> Crosswalk {
    let mut crosswalk = Crosswalk::new();
    for row in rows {
        crosswalk.insert(&row.cty_iso2, &row.cty_iso3, Some(row.cty_name.as_str()));
    }
    crosswalk
}
