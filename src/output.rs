//! Output formatting and persistence for coverage reports.
//!
//! Supports a fixed-width text table, JSON serialization, and CSV export.

use anyhow::Result;
use csv::WriterBuilder;
use std::path::Path;
use tracing::debug;

use crate::coverage::types::{CheckOutcome, CoverageReports, CoverageRow, CoverageSummary, CoverageTable, SeriesReport};
use crate::coverage::utility::round2;

pub const SIZE_PERIOD_LABEL: &str = "GDP Last Reporting Year";
pub const SIZE_VALUE_LABEL: &str = "Last GDP Reported (USD Billion)";
pub const PERCENTAGE_LABEL: &str = "Percentage of Periods Reported";

/// Column headers of a coverage table; decade columns sit between size and percentage.
pub fn table_headers(table: &CoverageTable) -> Vec<String> {
    let mut headers = vec![
        table.crosswalk_column.clone(),
        "Entity ID".to_string(),
        "Description".to_string(),
        SIZE_PERIOD_LABEL.to_string(),
        SIZE_VALUE_LABEL.to_string(),
    ];
    headers.extend(table.decades.iter().map(|d| d.to_string()));
    headers.push(PERCENTAGE_LABEL.to_string());
    headers
}

fn row_cells(row: &CoverageRow) -> Vec<String> {
    let mut cells = vec![
        row.entity_id_crosswalked.clone().unwrap_or_default(),
        row.entity_id.clone(),
        row.description.clone(),
        row.size_last_period
            .map(|p| p.year().to_string())
            .unwrap_or_default(),
        if row.size_available {
            format!("{:.2}", round2(row.size_value / 1e9))
        } else {
            String::new()
        },
    ];
    cells.extend(row.decades.iter().map(|v| format!("{v:.2}")));
    cells.push(format!("{:.2}", row.percentage_reported));
    cells
}

fn summary_headers() -> Vec<String> {
    vec![
        "Series".to_string(),
        "Mean Weighted Reported Percentage".to_string(),
        "Entities".to_string(),
    ]
}

fn summary_cells(summary: &CoverageSummary) -> Vec<String> {
    vec![
        summary.series_id.clone(),
        format!("{:.4}", summary.mean_weighted_reported_percentage),
        summary.entity_count.to_string(),
    ]
}

fn reports_in_order(reports: &CoverageReports) -> Vec<&SeriesReport> {
    match reports {
        CoverageReports::Single(report) => vec![report],
        CoverageReports::BySeries(reports) => reports.iter().collect(),
    }
}

/// Pads every column to its widest cell.
fn format_grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers));
    out.push('\n');
    out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

/// Renders a single table.
pub fn format_table(table: &CoverageTable) -> String {
    let rows: Vec<Vec<String>> = table.rows.iter().map(row_cells).collect();
    format_grid(&table_headers(table), &rows)
}

/// Renders every report, one block per series.
pub fn format_reports(outcome: &CheckOutcome) -> String {
    let mut out = String::new();
    let reports = reports_in_order(&outcome.reports);

    let summaries: Vec<Vec<String>> = reports
        .iter()
        .filter_map(|r| r.as_summary())
        .map(summary_cells)
        .collect();
    if !summaries.is_empty() {
        out.push_str(&format_grid(&summary_headers(), &summaries));
    }

    for table in reports.iter().filter_map(|r| r.as_table()) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("{} ({})\n", table.series_id, table.frequency));
        out.push_str(&format_table(table));
    }

    if !outcome.not_found.is_empty() {
        out.push_str(&format!("\nSeries not found: {}\n", outcome.not_found.join(", ")));
    }
    out
}

pub fn print_pretty(outcome: &CheckOutcome) {
    print!("{}", format_reports(outcome));
}

pub fn print_json(outcome: &CheckOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

/// Writes the reports to a CSV file, replacing it.
///
/// Tables get a leading `Series` column so several series share one file;
/// summaries are written one row per series.
pub fn write_csv(path: &Path, outcome: &CheckOutcome) -> Result<()> {
    let reports = reports_in_order(&outcome.reports);
    debug!(path = %path.display(), reports = reports.len(), "Writing CSV report");

    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    let mut header_written = false;

    for report in reports {
        match report {
            SeriesReport::Table(table) => {
                if !header_written {
                    let mut headers = vec!["Series".to_string()];
                    headers.extend(table_headers(table));
                    writer.write_record(&headers)?;
                    header_written = true;
                }
                for row in &table.rows {
                    let mut cells = vec![table.series_id.clone()];
                    cells.extend(row_cells(row));
                    writer.write_record(&cells)?;
                }
            }
            SeriesReport::Summary(summary) => {
                if !header_written {
                    writer.write_record(summary_headers())?;
                    header_written = true;
                }
                writer.write_record(summary_cells(summary))?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}
