//! Delimited text decoding: the default [`RecordDecoder`].
//!
//! Each file is decompressed (see [`compression`](crate::io::compression)),
//! split into rows and fields with the `csv` crate using a single-byte
//! delimiter, decoded from the configured character set, and projected onto the
//! configured columns.
//!
//! A row that cannot be converted (bad number or date, missing column, bad UTF-8)
//! is a dirty record for that line only; the rest of the file still flows. A
//! stream that cannot be read at all fails the whole file.
//!
//! # Example
//!
//! ```
//! use ironferry::dirty::DirtyRecordCollector;
//! use ironferry::io::text::{ColumnSource, ColumnSpec, ColumnType, DelimitedTextDecoder, TextOptions};
//! use ironferry::record::{Column, RecordDecoder, VecSink};
//! use std::io::Cursor;
//!
//! let decoder = DelimitedTextDecoder::new(TextOptions {
//!     delimiter: b'|',
//!     columns: Some(vec![
//!         ColumnSpec::new(ColumnSource::Index(1), ColumnType::Long),
//!         ColumnSpec::new(ColumnSource::Constant("eu".into()), ColumnType::String),
//!     ]),
//!     ..TextOptions::default()
//! });
//!
//! let mut sink = VecSink::new();
//! let dirty = DirtyRecordCollector::new();
//! let stream = Box::new(Cursor::new(b"a|1\nb|x\n".to_vec()));
//! let sent = decoder.decode("/d/f.txt", stream, &mut sink, &dirty).unwrap();
//!
//! assert_eq!(sent, 1);
//! assert_eq!(sink.records()[0].columns, vec![Column::Long(1), Column::String("eu".into())]);
//! assert_eq!(dirty.count(), 1);
//! ```

use crate::dirty::{DirtyRecordCollector, FailureStage};
use crate::error::DecodeError;
use crate::io::compression::decompress_reader;
use crate::record::{Column, Record, RecordDecoder, RecordSink};
use crate::transport::ByteStream;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

/// Character sets the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-8, which also covers US-ASCII.
    #[default]
    Utf8,
    /// ISO-8859-1: every byte is the code point of the same value.
    Latin1,
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => Ok(TextEncoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Ok(TextEncoding::Latin1),
            _ => Err(format!("unsupported encoding [{}]", s.trim())),
        }
    }
}

/// Target type of a projected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Long,
    Double,
    Boolean,
    Date,
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(ColumnType::String),
            "long" | "int" => Ok(ColumnType::Long),
            "double" => Ok(ColumnType::Double),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            other => Err(format!(
                "unsupported column type [{other}], expected string, long, double, boolean or date"
            )),
        }
    }
}

/// Where a projected column's raw text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// Zero-based field of the row.
    Index(usize),
    /// The same constant for every row.
    Constant(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub source: ColumnSource,
    pub kind: ColumnType,
    /// Only read for [`ColumnType::Date`]; `None` tries [`DEFAULT_DATE_FORMATS`].
    pub format: Option<DateFormat>,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(source: ColumnSource, kind: ColumnType) -> Self {
        Self {
            source,
            kind,
            format: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: DateFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Formats tried, in order, for a date column without its own format.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d",
];

/// Parse pattern of a date column, held in chrono's `strftime` syntax.
///
/// Job files may also spell patterns the `yyyy-MM-dd HH:mm:ss` way; those are
/// translated on construction. A pattern containing `%` is taken as `strftime`
/// already.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat(String);

impl DateFormat {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Date and time of `text`; a date without a time of day is midnight.
    #[must_use]
    pub fn parse_value(&self, text: &str) -> Option<NaiveDateTime> {
        parse_date(text, &self.0)
    }
}

impl FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("date format must not be blank".to_string());
        }
        if s.contains('%') {
            return Ok(DateFormat(s.to_string()));
        }
        let mut out = String::new();
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                // quoted literal text; '' is a literal quote
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push('\'');
                    continue;
                }
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    push_literal(&mut out, q);
                }
                continue;
            }
            if !c.is_ascii_alphabetic() {
                push_literal(&mut out, c);
                continue;
            }
            let mut run = 1;
            while chars.peek() == Some(&c) {
                chars.next();
                run += 1;
            }
            let spec = match (c, run) {
                ('y', 2) => "%y",
                ('y', _) => "%Y",
                ('M', 1 | 2) => "%m",
                ('M', 3) => "%b",
                ('M', _) => "%B",
                ('d', _) => "%d",
                ('H', _) => "%H",
                ('h', _) => "%I",
                ('m', _) => "%M",
                ('s', _) => "%S",
                ('S', 3) => "%3f",
                ('a', _) => "%p",
                ('E', 1..=3) => "%a",
                ('E', _) => "%A",
                _ => {
                    return Err(format!(
                        "unsupported date format [{s}]: cannot use `{}`",
                        c.to_string().repeat(run)
                    ));
                }
            };
            out.push_str(spec);
        }
        Ok(DateFormat(out))
    }
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

fn parse_date(text: &str, pattern: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, pattern).ok().or_else(|| {
        NaiveDate::parse_from_str(text, pattern)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOptions {
    pub encoding: TextEncoding,
    /// Codec name; `None` falls back to the file extension.
    pub compress: Option<String>,
    pub delimiter: u8,
    pub skip_header: bool,
    /// Raw text that decodes to [`Column::Null`].
    pub null_format: Option<String>,
    /// `None` keeps every field as a string.
    pub columns: Option<Vec<ColumnSpec>>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::Utf8,
            compress: None,
            delimiter: b',',
            skip_header: false,
            null_format: None,
            columns: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DelimitedTextDecoder {
    options: TextOptions,
}

impl DelimitedTextDecoder {
    #[must_use]
    pub fn new(options: TextOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &TextOptions {
        &self.options
    }

    fn to_record(&self, path: &str, row: &csv::ByteRecord) -> Result<Record, String> {
        let fields = row
            .iter()
            .enumerate()
            .map(|(i, raw)| self.decode_field(i, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let columns = match &self.options.columns {
            None => fields
                .iter()
                .map(|f| self.convert(f, ColumnType::String, None))
                .collect::<Result<Vec<_>, _>>()?,
            Some(specs) => specs
                .iter()
                .map(|spec| {
                    let raw = match &spec.source {
                        ColumnSource::Index(i) => fields.get(*i).map(|f| &**f).ok_or_else(
                            || format!("column index {i} out of range, row has {} fields", fields.len()),
                        )?,
                        ColumnSource::Constant(value) => value.as_str(),
                    };
                    self.convert_as(raw, spec)
                })
                .collect::<Result<Vec<_>, String>>()?,
        };
        Ok(Record::new(path, columns))
    }

    fn decode_field<'a>(&self, index: usize, raw: &'a [u8]) -> Result<Cow<'a, str>, String> {
        match self.options.encoding {
            TextEncoding::Utf8 => std::str::from_utf8(raw)
                .map(Cow::Borrowed)
                .map_err(|_| format!("field {index} is not valid UTF-8")),
            TextEncoding::Latin1 => Ok(Cow::Owned(raw.iter().map(|&b| char::from(b)).collect())),
        }
    }

    fn convert_as(&self, raw: &str, spec: &ColumnSpec) -> Result<Column, String> {
        self.convert(raw, spec.kind, spec.format.as_ref())
    }

    /// Typed value of `raw`. Blank text is null for every non-string type.
    fn convert(
        &self,
        raw: &str,
        kind: ColumnType,
        format: Option<&DateFormat>,
    ) -> Result<Column, String> {
        if self.options.null_format.as_deref() == Some(raw) {
            return Ok(Column::Null);
        }
        let trimmed = raw.trim();
        if kind != ColumnType::String && trimmed.is_empty() {
            return Ok(Column::Null);
        }
        match kind {
            ColumnType::String => Ok(Column::String(raw.to_string())),
            ColumnType::Long => trimmed
                .parse()
                .map(Column::Long)
                .map_err(|_| format!("cannot convert [{raw}] to long")),
            ColumnType::Double => trimmed
                .parse()
                .map(Column::Double)
                .map_err(|_| format!("cannot convert [{raw}] to double")),
            ColumnType::Boolean => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(Column::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(Column::Bool(false))
                } else {
                    Err(format!("cannot convert [{raw}] to boolean"))
                }
            }
            ColumnType::Date => {
                let parsed = match format {
                    Some(format) => format.parse_value(trimmed),
                    None => DEFAULT_DATE_FORMATS
                        .iter()
                        .find_map(|pattern| parse_date(trimmed, pattern)),
                };
                parsed.map(Column::Date).ok_or_else(|| match format {
                    Some(format) => {
                        format!("cannot convert [{raw}] to date with format [{}]", format.as_str())
                    }
                    None => format!("cannot convert [{raw}] to date"),
                })
            }
        }
    }
}

impl RecordDecoder for DelimitedTextDecoder {
    fn decode(
        &self,
        path: &str,
        stream: ByteStream,
        sink: &mut dyn RecordSink,
        dirty: &DirtyRecordCollector,
    ) -> Result<u64, DecodeError> {
        let reader = decompress_reader(stream, path, self.options.compress.as_deref())
            .map_err(|e| DecodeError::Compression(format!("{e:#}")))?;
        let mut rows = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut sent = 0;
        let mut header_pending = self.options.skip_header;
        for row in rows.byte_records() {
            let row = row.map_err(|e| DecodeError::Read {
                line: e.position().map_or(0, csv::Position::line),
                message: e.to_string(),
            })?;
            if header_pending {
                header_pending = false;
                continue;
            }
            match self.to_record(path, &row) {
                Ok(record) => {
                    sink.send(record);
                    sent += 1;
                }
                Err(message) => {
                    let line = row.position().map(csv::Position::line);
                    dirty.record(path, line, FailureStage::Convert, message);
                }
            }
        }
        Ok(sent)
    }
}
