//! Local data store: observation CSVs, SDMX code lists and size tables on disk.

mod codelist;
mod csv_store;
pub mod layout;
pub mod size_table;

pub use csv_store::CsvDataStore;
pub use layout::DatasetLayout;
