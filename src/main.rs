//! CLI entry point for the reporting coverage checker.
//!
//! Provides subcommands for checking which entities report a series, listing a
//! dataset's reference entities, and downloading the size metric used to rank them.

use anyhow::Result;
use clap::{Parser, Subcommand};
use reporting_coverage::{
    config::Config,
    coverage::{CheckRequest, ReportingChecker},
    fetch::BasicClient,
    ignore::IgnoreList,
    infra::store::CsvDataStore,
    infra::worldbank::{FetchOutcome, WorldBankClient},
    output,
    period::{Frequency, Period},
    services::{DataSource, DatasetRef},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "reporting_coverage")]
#[command(about = "Check which entities report a data series, decade by decade", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the reporting coverage table for one or more series
    Check {
        /// Data provider, e.g. IMF
        #[arg(long, default_value = "IMF")]
        provider: String,

        /// Dataset of the provider, e.g. IFS
        #[arg(long, default_value = "IFS")]
        dataset: String,

        /// Sub-dataset holding the series (file name without extension)
        #[arg(long)]
        subdata: String,

        /// Frequency code: A, Q or M
        #[arg(short, long, default_value = "A")]
        freq: Frequency,

        /// Series ids to check
        #[arg(value_name = "SERIES", required = true, num_args = 1..)]
        series: Vec<String>,

        /// Print a size-weighted summary per series instead of the table
        #[arg(long, default_value_t = false)]
        summarized: bool,

        /// Only show entities with a percentage reported at or below this value
        #[arg(long)]
        report_percen: Option<f64>,

        /// First period to consider (e.g. 2000, 2000-Q1, 2000-01)
        #[arg(long)]
        start: Option<Period>,

        /// Last period to consider
        #[arg(long)]
        end: Option<Period>,

        /// Include entities without size data
        #[arg(long, default_value_t = false)]
        all: bool,

        /// Fail when a reference entity has no size data and is not ignored
        #[arg(long, default_value_t = false)]
        strict_size: bool,

        /// CSV file to write the report to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the reference entities of a dataset
    ListEntities {
        #[arg(long, default_value = "IMF")]
        provider: String,

        #[arg(long, default_value = "IFS")]
        dataset: String,
    },
    /// Download a World Bank size metric into the data store
    FetchSize {
        /// WDI indicator id; defaults to the configured size metric
        #[arg(value_name = "METRIC")]
        metric: Option<String>,

        /// Replace an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let config = Config::from_env()?;
    let _file_guard = init_logging(&config.log_file_path);

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            provider,
            dataset,
            subdata,
            freq,
            series,
            summarized,
            report_percen,
            start,
            end,
            all,
            strict_size,
            output: report_path,
            json,
        } => {
            let ignore = load_ignore_list(&config)?;
            let store = CsvDataStore::new(&config);
            let checker = ReportingChecker::new(&store, &ignore, config.size_metric.clone());

            let mut request = CheckRequest::new(DatasetRef::new(provider, dataset, subdata), series, freq);
            request.summarized = summarized;
            request.report_percen = report_percen;
            request.start = start;
            request.end = end;
            request.include_all_entities = all;
            request.strict_size = strict_size;

            let outcome = checker.run(&request)?;

            if !outcome.not_found.is_empty() {
                warn!(not_found = ?outcome.not_found, "Some series were not found");
            }

            if json {
                output::print_json(&outcome)?;
            } else {
                output::print_pretty(&outcome);
            }

            if let Some(path) = report_path {
                output::write_csv(&path, &outcome)?;
                info!(path = %path.display(), "Report written");
            }
        }
        Commands::ListEntities { provider, dataset } => {
            let ignore = load_ignore_list(&config)?;
            let store = CsvDataStore::new(&config);
            let entities = store.reference_entities(&DatasetRef::new(&provider, &dataset, ""))?;
            let ignored = ignore.for_dataset(&provider, &dataset);

            info!(
                total = entities.entities.len(),
                code_system = %entities.code_system,
                "Reference entities"
            );
            for entity in &entities.entities {
                let marker = if ignored.matches_any([entity.id.as_str(), entity.description.as_str()]) {
                    "ignored"
                } else {
                    ""
                };
                println!("{}\t{}\t{}", entity.id, entity.description, marker);
            }
        }
        Commands::FetchSize { metric, force } => {
            let metric = metric.unwrap_or_else(|| config.size_metric.clone());
            let path = config.size_table_path(&metric);

            let http = BasicClient::new()?;
            let client = WorldBankClient::new(&http, config.worldbank_url.as_str());
            match client.fetch_size(&metric, &path, force).await? {
                FetchOutcome::Kept => info!(metric, path = %path.display(), "Size table kept"),
                FetchOutcome::Written { rows } => {
                    info!(metric, rows, path = %path.display(), "Size table fetched")
                }
            }
        }
    }

    Ok(())
}

/// Colored stderr plus a JSON daily-rolling log file.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(log_file_path: &Path) -> WorkerGuard {
    let log_dir = log_file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = log_file_path
        .file_name()
        .unwrap_or(OsStr::new("reporting_coverage.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    file_guard
}

fn load_ignore_list(config: &Config) -> Result<IgnoreList> {
    let list = match &config.ignore_list_path {
        Some(path) => {
            info!(path = %path.display(), "Loading ignore-list override");
            IgnoreList::load(path)?
        }
        None => IgnoreList::embedded()?,
    };
    Ok(list)
}
