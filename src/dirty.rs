//! Collection of dirty records: per-item failures that are reported, not fatal.
//!
//! A file that cannot be opened or decoded, or a single row that cannot be
//! converted, becomes one [`DirtyRecord`]. The collector counts every one and
//! keeps the first few as samples for the end-of-job summary.
//!
//! The collector is cheap to clone and every clone feeds the same totals, so
//! each shard worker can hold its own handle.
//!
//! # Example
//!
//! ```
//! use ironferry::dirty::{DirtyRecordCollector, FailureStage};
//!
//! let collector = DirtyRecordCollector::new();
//! collector.record("/data/x.csv", None, FailureStage::Transfer, "file not found");
//!
//! let summary = collector.summary();
//! assert_eq!(summary.total, 1);
//! assert_eq!(summary.transfer, 1);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Number of samples kept when none is configured.
pub const DEFAULT_SAMPLE_LIMIT: usize = 20;

/// Where in the read a dirty record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The file could not be opened through the session.
    Transfer,
    /// The file's bytes could not be decoded.
    Decode,
    /// One row could not be converted to the configured column types.
    Convert,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::Transfer => "transfer",
            FailureStage::Decode => "decode",
            FailureStage::Convert => "convert",
        };
        f.write_str(name)
    }
}

/// A single skipped item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyRecord {
    pub path: String,
    /// 1-based line for row-level failures.
    pub line: Option<u64>,
    pub stage: FailureStage,
    pub message: String,
}

impl fmt::Display for DirtyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "[{}] {}:{}: {}", self.stage, self.path, line, self.message),
            None => write!(f, "[{}] {}: {}", self.stage, self.path, self.message),
        }
    }
}

/// Totals per stage plus the retained samples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtySummary {
    pub total: usize,
    pub transfer: usize,
    pub decode: usize,
    pub convert: usize,
    pub samples: Vec<DirtyRecord>,
}

impl DirtySummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl fmt::Display for DirtySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dirty records (transfer: {}, decode: {}, convert: {})",
            self.total, self.transfer, self.decode, self.convert
        )
    }
}

/// Thread-safe, append-only sink for dirty records.
#[derive(Debug, Clone)]
pub struct DirtyRecordCollector {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    summary: DirtySummary,
    sample_limit: usize,
}

impl DirtyRecordCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sample_limit(DEFAULT_SAMPLE_LIMIT)
    }

    #[must_use]
    pub fn with_sample_limit(sample_limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                summary: DirtySummary::default(),
                sample_limit,
            })),
        }
    }

    /// Record one skipped item.
    pub fn record(
        &self,
        path: impl Into<String>,
        line: Option<u64>,
        stage: FailureStage,
        message: impl Into<String>,
    ) {
        let dirty = DirtyRecord {
            path: path.into(),
            line,
            stage,
            message: message.into(),
        };
        warn!(path = %dirty.path, line = ?dirty.line, %stage, message = %dirty.message, "dirty record");

        let mut inner = self.lock();
        let sample_limit = inner.sample_limit;
        let summary = &mut inner.summary;
        summary.total += 1;
        match stage {
            FailureStage::Transfer => summary.transfer += 1,
            FailureStage::Decode => summary.decode += 1,
            FailureStage::Convert => summary.convert += 1,
        }
        if summary.samples.len() < sample_limit {
            summary.samples.push(dirty);
        }
    }

    /// Total number of dirty records seen so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().summary.total
    }

    #[must_use]
    pub fn summary(&self) -> DirtySummary {
        self.lock().summary.clone()
    }

    /// Export the summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.summary())
    }

    /// Write the JSON summary to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a panicking worker must not hide the dirty records already counted
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for DirtyRecordCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DirtyRecordCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirtyRecordCollector({} dirty records)", self.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_record_but_caps_samples() {
        let collector = DirtyRecordCollector::with_sample_limit(2);
        for i in 0..5 {
            collector.record(format!("/f{i}"), Some(i), FailureStage::Convert, "bad long");
        }
        let summary = collector.summary();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.convert, 5);
        assert_eq!(summary.samples.len(), 2);
        assert_eq!(summary.samples[0].path, "/f0");
    }

    #[test]
    fn clones_share_totals() {
        let collector = DirtyRecordCollector::new();
        let other = collector.clone();
        other.record("/a", None, FailureStage::Transfer, "not found");
        collector.record("/b", None, FailureStage::Decode, "bad gzip");
        assert_eq!(collector.count(), 2);
        assert_eq!(other.summary().decode, 1);
    }

    #[test]
    fn json_export_includes_samples() {
        let collector = DirtyRecordCollector::new();
        collector.record("/a", Some(3), FailureStage::Convert, "oops");
        let json = collector.to_json().unwrap();
        assert!(json.contains("\"convert\""));
        assert!(json.contains("/a"));
    }

    #[test]
    fn display_names_location() {
        let dirty = DirtyRecord {
            path: "/a".into(),
            line: Some(7),
            stage: FailureStage::Convert,
            message: "bad".into(),
        };
        assert_eq!(dirty.to_string(), "[convert] /a:7: bad");
    }
}
