pub mod config;
pub mod coverage;
pub mod crosswalk;
pub mod error;
pub mod fetch;
pub mod ignore;
pub mod infra;
pub mod output;
pub mod period;
pub mod services;
