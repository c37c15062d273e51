//! Coverage input: the sparse per-line map handed to the viewer and the
//! summary shown next to it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Outcome recorded for a line in the coverage input.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum Coverage {
    #[serde(alias = "H", alias = "hit")]
    Hit,
    #[serde(alias = "M", alias = "miss")]
    Miss,
    #[serde(alias = "P", alias = "partial")]
    Partial,
}

/// Coverage of a rendered line. `None` means the input had no data for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CoverageStatus {
    Hit,
    Miss,
    Partial,
    #[default]
    None,
}

impl From<Coverage> for CoverageStatus {
    fn from(value: Coverage) -> Self {
        match value {
            Coverage::Hit => CoverageStatus::Hit,
            Coverage::Miss => CoverageStatus::Miss,
            Coverage::Partial => CoverageStatus::Partial,
        }
    }
}

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("failed to read coverage from {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed coverage JSON")]
    Json(#[from] serde_json::Error),
    #[error("invalid line number `{0}` in coverage map")]
    InvalidLine(String),
}

/// Sparse map from 1-based line number to coverage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageMap {
    lines: BTreeMap<usize, Coverage>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, line_number: usize, coverage: Coverage) {
        self.lines.insert(line_number, coverage);
    }

    /// Status for a 1-based line number; unknown keys resolve to `None`.
    pub fn status(&self, line_number: usize) -> CoverageStatus {
        self.lines
            .get(&line_number)
            .copied()
            .map_or(CoverageStatus::None, CoverageStatus::from)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Parses an object of the form `{"1": "H", "2": "M", "7": "P"}`.
    pub fn from_json_str(source: &str) -> Result<Self, CoverageError> {
        let raw: BTreeMap<String, Coverage> = serde_json::from_str(source)?;
        let mut map = Self::new();
        for (key, coverage) in raw {
            let line_number = key
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| CoverageError::InvalidLine(key.clone()))?;
            map.insert(line_number, coverage);
        }
        Ok(map)
    }

    pub fn load(path: &Path) -> Result<Self, CoverageError> {
        let source = fs::read_to_string(path).map_err(|source| CoverageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let map = Self::from_json_str(&source)?;
        debug!(target: "coverage", path = %path.display(), entries = map.len(), "coverage_loaded");
        Ok(map)
    }
}

impl FromIterator<(usize, Coverage)> for CoverageMap {
    fn from_iter<T: IntoIterator<Item = (usize, Coverage)>>(iter: T) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

/// Per-status tallies over a rendered file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoverageSummary {
    pub lines: usize,
    pub hits: usize,
    pub misses: usize,
    pub partials: usize,
}

impl CoverageSummary {
    pub fn tally(statuses: impl IntoIterator<Item = CoverageStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            summary.lines += 1;
            match status {
                CoverageStatus::Hit => summary.hits += 1,
                CoverageStatus::Miss => summary.misses += 1,
                CoverageStatus::Partial => summary.partials += 1,
                CoverageStatus::None => {}
            }
        }
        summary
    }

    /// Lines carrying any coverage data.
    pub fn tracked(&self) -> usize {
        self.hits + self.misses + self.partials
    }

    /// Hit ratio as a percentage, `None` when no line is tracked.
    pub fn percentage(&self) -> Option<f64> {
        let tracked = self.tracked();
        if tracked == 0 {
            return None;
        }
        Some(self.hits as f64 * 100.0 / tracked as f64)
    }
}
