//! Error taxonomy for the reporting-coverage checker.
//!
//! Construction errors are fatal and carry enough context (series, frequency,
//! offending entities) for the caller to fix the input. `SeriesNotFound` is the
//! only variant the orchestrator recovers from.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoverageError>;

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("No series requested")]
    NoSeriesRequested,

    #[error("Series not found: {}", .not_found.join(", "))]
    SeriesNotFound { not_found: Vec<String> },

    #[error(
        "Need to pull size metric '{metric}' before creating the reporting check.\n\
         Run `reporting_coverage fetch-size {metric}` to store it under {path}."
    )]
    MissingSizeData { metric: String, path: String },

    #[error(
        "Error constructing reporting check for {series} ({frequency}). \
         Entities present in the data but not in the reference list:\n{}",
        .entities.join("\n")
    )]
    UnmappedEntities {
        series: String,
        frequency: String,
        entities: Vec<String>,
    },

    #[error(
        "Error constructing reporting check for {series} ({frequency}). \
         Entities without size data that are not on the ignore-list:\n{}",
        .entities.join("\n")
    )]
    UnrankedEntities {
        series: String,
        frequency: String,
        entities: Vec<String>,
    },

    #[error("Merge is not one-to-one for {series} ({frequency}): duplicate key ({entity_id}, {period})")]
    MergeCardinality {
        series: String,
        frequency: String,
        entity_id: String,
        period: String,
    },

    #[error(
        "Error constructing reporting check for {series} ({frequency}). \
         Observation ({entity_id}, {period}) has no skeleton row; check construction."
    )]
    UnmatchedObservation {
        series: String,
        frequency: String,
        entity_id: String,
        period: String,
    },

    #[error("Empty {field} key in {context}")]
    EmptyKey { field: &'static str, context: String },

    #[error("Expected a single series per pass, got: {}", .series.join(", "))]
    MixedSeries { series: Vec<String> },

    #[error(
        "Error constructing reporting check for {series} ({frequency}). \
         Decade table and entity metadata do not match one-to-one: {detail}"
    )]
    AggregationMismatch {
        series: String,
        frequency: String,
        detail: String,
    },

    #[error("Reporting check not yet implemented for provider = {provider}, dataset = {dataset}")]
    UnsupportedDataset { provider: String, dataset: String },

    #[error("No {what} for {dataset} at {path}")]
    MissingDataset {
        what: &'static str,
        dataset: String,
        path: String,
    },

    #[error("Invalid frequency code '{0}', expected one of A, Q, M")]
    InvalidFrequency(String),

    #[error("Invalid period '{0}'")]
    InvalidPeriod(String),

    #[error("Malformed {what} at {path}: {reason}")]
    Malformed {
        what: &'static str,
        path: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Problems with the process environment, raised while building [`crate::config::Config`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for environment variable {var}: {reason}")]
    InvalidEnvValue { var: String, reason: String },
}
