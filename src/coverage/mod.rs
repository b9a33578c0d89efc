//! Reporting coverage of series across reference entities.
//!
//! Observations are matched one-to-one against an entity x period skeleton,
//! counted per decade, expressed relative to the best-covered entity, then
//! filtered and ranked by entity size.

pub mod aggregate;
pub mod check;
pub mod report;
pub mod skeleton;
pub mod types;
pub mod utility;

pub use check::{CheckRequest, ReportingChecker};
