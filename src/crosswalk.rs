//! ISO2 / ISO3 / short-name crosswalk between entity code systems.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;

/// Identifier system an entity column is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeSystem {
    Iso2,
    Iso3,
}

impl CodeSystem {
    /// The other code system, used for the crosswalked output column.
    pub fn alternate(self) -> Self {
        match self {
            CodeSystem::Iso2 => CodeSystem::Iso3,
            CodeSystem::Iso3 => CodeSystem::Iso2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CodeSystem::Iso2 => "cty_iso2",
            CodeSystem::Iso3 => "cty_iso3",
        }
    }
}

impl fmt::Display for CodeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeSystem::Iso2 => f.write_str("ISO2"),
            CodeSystem::Iso3 => f.write_str("ISO3"),
        }
    }
}

/// How loudly lookups report misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
}

#[derive(Debug, Clone, Deserialize)]
struct CrosswalkRecord {
    iso2: String,
    iso3: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Crosswalk {
    iso2_to_iso3: HashMap<String, String>,
    iso3_to_iso2: HashMap<String, String>,
    names: HashMap<String, String>,
}

impl Crosswalk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one country. Empty codes are skipped; later inserts win.
    pub fn insert(&mut self, iso2: &str, iso3: &str, name: Option<&str>) {
        let iso2 = iso2.trim().to_ascii_uppercase();
        let iso3 = iso3.trim().to_ascii_uppercase();
        if iso2.is_empty() || iso3.is_empty() {
            return;
        }
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            self.names.insert(iso2.clone(), name.to_string());
            self.names.insert(iso3.clone(), name.to_string());
        }
        self.iso2_to_iso3.insert(iso2.clone(), iso3.clone());
        self.iso3_to_iso2.insert(iso3, iso2);
    }

    /// Adds entries from a CSV with `iso2,iso3[,name]` columns.
    pub fn extend_from_csv(&mut self, path: &Path) -> Result<()> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let mut count = 0usize;
        for result in rdr.deserialize() {
            let record: CrosswalkRecord = result?;
            self.insert(&record.iso2, &record.iso3, record.name.as_deref());
            count += 1;
        }
        debug!(path = %path.display(), count, "Crosswalk entries loaded");
        Ok(())
    }

    pub fn merge(&mut self, other: Crosswalk) {
        self.iso2_to_iso3.extend(other.iso2_to_iso3);
        self.iso3_to_iso2.extend(other.iso3_to_iso2);
        self.names.extend(other.names);
    }

    pub fn len(&self) -> usize {
        self.iso2_to_iso3.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iso2_to_iso3.is_empty()
    }

    /// Converts `id` from one code system to another.
    ///
    /// Misses are logged at `warn` in [`Verbosity::Normal`] and at `debug` when quiet.
    pub fn convert(
        &self,
        id: &str,
        from: CodeSystem,
        to: CodeSystem,
        verbosity: Verbosity,
    ) -> Option<String> {
        let key = id.trim().to_ascii_uppercase();
        if from == to {
            return Some(key);
        }
        let found = match from {
            CodeSystem::Iso2 => self.iso2_to_iso3.get(&key),
            CodeSystem::Iso3 => self.iso3_to_iso2.get(&key),
        }
        .cloned();

        if found.is_none() {
            match verbosity {
                Verbosity::Normal => warn!(id, %from, %to, "Code not found in crosswalk"),
                Verbosity::Quiet => debug!(id, %from, %to, "Code not found in crosswalk"),
            }
        }
        found
    }

    /// Short country name for a code in either system.
    pub fn name(&self, id: &str) -> Option<&str> {
        self.names
            .get(&id.trim().to_ascii_uppercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Crosswalk {
        let mut cw = Crosswalk::new();
        cw.insert("US", "USA", Some("United States"));
        cw.insert("de", "deu", Some("Germany"));
        cw
    }

    #[test]
    fn test_convert_both_directions() {
        let cw = sample();
        assert_eq!(
            cw.convert("US", CodeSystem::Iso2, CodeSystem::Iso3, Verbosity::Quiet),
            Some("USA".to_string())
        );
        assert_eq!(
            cw.convert("DEU", CodeSystem::Iso3, CodeSystem::Iso2, Verbosity::Quiet),
            Some("DE".to_string())
        );
    }

    #[test]
    fn test_convert_same_system_is_identity() {
        let cw = Crosswalk::new();
        assert_eq!(
            cw.convert("xx", CodeSystem::Iso2, CodeSystem::Iso2, Verbosity::Normal),
            Some("XX".to_string())
        );
    }

    #[test]
    fn test_convert_miss_returns_none() {
        let cw = sample();
        assert_eq!(
            cw.convert("ZZ", CodeSystem::Iso2, CodeSystem::Iso3, Verbosity::Quiet),
            None
        );
    }

    #[test]
    fn test_name_lookup_either_code() {
        let cw = sample();
        assert_eq!(cw.name("usa"), Some("United States"));
        assert_eq!(cw.name("DE"), Some("Germany"));
        assert_eq!(cw.name("FR"), None);
    }

    #[test]
    fn test_insert_skips_empty_codes() {
        let mut cw = Crosswalk::new();
        cw.insert("", "AFE", Some("Africa Eastern and Southern"));
        assert!(cw.is_empty());
    }

    #[test]
    fn test_extend_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("countries.csv");
        std::fs::write(&path, "iso2,iso3,name\nFR,FRA,France\nJP,JPN,\n").unwrap();

        let mut cw = Crosswalk::new();
        cw.extend_from_csv(&path).unwrap();
        assert_eq!(cw.len(), 2);
        assert_eq!(cw.name("FRA"), Some("France"));
        assert_eq!(cw.name("JP"), None);
    }
}
