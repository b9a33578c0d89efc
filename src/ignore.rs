//! Known non-reporting aggregates (regional blocs, "World", currency unions).
//!
//! Stored as a plain JSON object keyed by provider, then dataset:
//! ```json
//! { "IMF": { "IFS": ["World", "Euro area", "G20"] } }
//! ```
//! A label is ignored when it starts with one of the patterns, compared
//! case-insensitively.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{CoverageError, Result};

const DEFAULT_IGNORE_LIST: &str = include_str!("../config/ignore_entities.json");

#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    entries: HashMap<String, HashMap<String, Vec<String>>>,
}

impl IgnoreList {
    /// The list shipped with the crate.
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_IGNORE_LIST, "embedded ignore-list")
    }

    /// Loads an override from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    fn parse(content: &str, origin: &str) -> Result<Self> {
        let entries = serde_json::from_str(content).map_err(|e| CoverageError::Malformed {
            what: "ignore-list",
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { entries })
    }

    /// Patterns configured for one provider/dataset pair.
    pub fn for_dataset(&self, provider: &str, dataset: &str) -> DatasetIgnore {
        let patterns = self
            .entries
            .get(provider)
            .and_then(|datasets| datasets.get(dataset))
            .map(|p| p.iter().map(|s| s.to_lowercase()).collect())
            .unwrap_or_default();
        DatasetIgnore { patterns }
    }
}

impl From<HashMap<String, HashMap<String, Vec<String>>>> for IgnoreList {
    fn from(entries: HashMap<String, HashMap<String, Vec<String>>>) -> Self {
        Self { entries }
    }
}

/// Lower-cased ignore patterns for a single dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetIgnore {
    patterns: Vec<String>,
}

impl DatasetIgnore {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, label: &str) -> bool {
        let label = label.trim().to_lowercase();
        self.patterns.iter().any(|p| label.starts_with(p.as_str()))
    }

    /// True if any of the labels (id, description) is ignored.
    pub fn matches_any<'a>(&self, labels: impl IntoIterator<Item = &'a str>) -> bool {
        labels.into_iter().any(|l| self.matches(l))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
