//! Reporting cadence and period values.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoverageError;

/// Cadence of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Annual,
    Quarterly,
    Monthly,
}

impl Frequency {
    /// Number of periods that make up one year at this cadence.
    pub fn to_year(self) -> u32 {
        match self {
            Frequency::Annual => 1,
            Frequency::Quarterly => 4,
            Frequency::Monthly => 12,
        }
    }

    /// Provider code (`A`, `Q`, `M`).
    pub fn code(self) -> &'static str {
        match self {
            Frequency::Annual => "A",
            Frequency::Quarterly => "Q",
            Frequency::Monthly => "M",
        }
    }
}

impl FromStr for Frequency {
    type Err = CoverageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Frequency::Annual),
            "Q" => Ok(Frequency::Quarterly),
            "M" => Ok(Frequency::Monthly),
            _ => Err(CoverageError::InvalidFrequency(s.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A period identified by the date it starts on.
///
/// Accepted text forms: `2010`, `2010-Q3`, `2010Q3`, `2010-07`, `2010-07-01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period(NaiveDate);

impl Period {
    pub fn annual(year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, 1, 1).map(Self)
    }

    pub fn quarter(year: i32, quarter: u32) -> Option<Self> {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1).map(Self)
    }

    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn decade(&self) -> i32 {
        self.year().div_euclid(10) * 10
    }
}

impl FromStr for Period {
    type Err = CoverageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || CoverageError::InvalidPeriod(s.to_string());

        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(Self(date));
        }

        let upper = raw.to_ascii_uppercase();
        if let Some((year, quarter)) = upper.split_once('Q') {
            let year: i32 = year.trim_end_matches('-').parse().map_err(|_| invalid())?;
            let quarter: u32 = quarter.parse().map_err(|_| invalid())?;
            return Self::quarter(year, quarter).ok_or_else(invalid);
        }

        if let Some((year, month)) = raw.split_once('-') {
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let month: u32 = month.parse().map_err(|_| invalid())?;
            return Self::month(year, month).ok_or_else(invalid);
        }

        if raw.len() == 4 {
            let year: i32 = raw.parse().map_err(|_| invalid())?;
            return Self::annual(year).ok_or_else(invalid);
        }

        Err(invalid())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
