//! World Bank WDI indicator download into the local size-table layout.

mod client;

pub use client::{FetchOutcome, IndicatorPage, WorldBankClient, parse_page};
