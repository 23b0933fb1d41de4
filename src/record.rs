//! Decoded records and the sinks they are forwarded to.

use crate::dirty::DirtyRecordCollector;
use crate::error::DecodeError;
use crate::transport::ByteStream;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One typed field of a decoded record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Null,
    String(String),
    Long(i64),
    Double(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl Column {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Column::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Column::Null)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Null => f.write_str("null"),
            Column::String(s) => f.write_str(s),
            Column::Long(v) => write!(f, "{v}"),
            Column::Double(v) => write!(f, "{v}"),
            Column::Bool(v) => write!(f, "{v}"),
            Column::Date(v) => write!(f, "{v}"),
        }
    }
}

/// A decoded row, tagged with the file it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub source: String,
    pub columns: Vec<Column>,
}

impl Record {
    pub fn new(source: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            source: source.into(),
            columns,
        }
    }
}

/// Downstream consumer of decoded records.
///
/// Each worker owns its own sink, so implementations need not be `Sync`.
pub trait RecordSink: Send {
    fn send(&mut self, record: Record);

    /// Called after each file has been fully decoded.
    fn flush(&mut self) {}
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    records: Vec<Record>,
    flushes: usize,
}

impl VecSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Number of completed files flushed into this sink.
    #[must_use]
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl RecordSink for VecSink {
    fn send(&mut self, record: Record) {
        self.records.push(record);
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

/// Sink that drops everything; useful for dry runs that only count.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl RecordSink for DiscardSink {
    fn send(&mut self, _record: Record) {}
}

/// Turns one file's bytes into records.
///
/// Row-level problems that do not invalidate the rest of the file should be
/// reported to `dirty` and skipped; an `Err` marks the whole file as dirty.
/// Records already sent before an `Err` are kept.
pub trait RecordDecoder: Send + Sync {
    /// Decode `stream` (the contents of `path`) into `sink`, returning how many
    /// records were sent.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the stream cannot be read or decompressed.
    fn decode(
        &self,
        path: &str,
        stream: ByteStream,
        sink: &mut dyn RecordSink,
        dirty: &DirtyRecordCollector,
    ) -> Result<u64, DecodeError>;
}
