//! Job configuration: the reader's JSON settings and their validation.
//!
//! Keys are camelCase, matching the job files this reader has always accepted:
//!
//! ```json
//! {
//!   "protocol": "sftp",
//!   "host": "files.example.com",
//!   "username": "etl",
//!   "password": "secret",
//!   "path": ["/data/in/*.csv", "/data/extra"],
//!   "fieldDelimiter": "|",
//!   "compress": "gzip",
//!   "column": [
//!     { "index": 0, "type": "long" },
//!     { "index": 3, "type": "date", "format": "yyyy-MM-dd" },
//!     { "value": "eu", "type": "string" }
//!   ]
//! }
//! ```
//!
//! Parsing never fails on missing keys; [`ReaderConfig::validate`] reports the
//! first bad or missing field by name instead.

use crate::error::{SourceError, SourceResult};
use crate::io::compression::{codec_by_name, codec_names};
use crate::io::text::{
    ColumnSource, ColumnSpec, ColumnType, DateFormat, TextEncoding, TextOptions,
};
use crate::transport::{Endpoint, Protocol};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// `path` accepts a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PathSetting {
    One(String),
    Many(Vec<String>),
}

/// One `column` entry: either the `"*"` wildcard or a typed field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnEntry {
    Wildcard(String),
    Field(ColumnConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ColumnConfig {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub value: Option<String>,
    /// Date pattern, for `date` columns only.
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderConfig {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    password: String,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub path: Option<PathSetting>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub compress: Option<String>,
    #[serde(default)]
    pub field_delimiter: Option<String>,
    #[serde(default)]
    pub skip_header: bool,
    #[serde(default)]
    pub null_format: Option<String>,
    #[serde(default)]
    pub column: Option<Vec<ColumnEntry>>,
    #[serde(default)]
    pub parallelism: Option<usize>,
}

impl fmt::Debug for ReaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderConfig")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("path", &self.path)
            .field("encoding", &self.encoding)
            .field("compress", &self.compress)
            .field("field_delimiter", &self.field_delimiter)
            .field("skip_header", &self.skip_header)
            .field("null_format", &self.null_format)
            .field("column", &self.column)
            .field("parallelism", &self.parallelism)
            .finish()
    }
}

impl ReaderConfig {
    /// Minimal valid configuration; everything else takes its default.
    pub fn new(
        protocol: Protocol,
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        paths: Vec<String>,
    ) -> Self {
        Self {
            protocol: protocol.to_string(),
            host: host.into(),
            port: None,
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT_MS,
            path: Some(PathSetting::Many(paths)),
            encoding: None,
            compress: None,
            field_delimiter: None,
            skip_header: false,
            null_format: None,
            column: None,
            parallelism: None,
        }
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the JSON is malformed or any field is
    /// invalid.
    pub fn from_json_str(json: &str) -> SourceResult<Self> {
        let config: ReaderConfig = serde_json::from_str(json)
            .map_err(|e| SourceError::config("config", format!("malformed JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the file cannot be read or is invalid.
    pub fn from_json_file(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SourceError::config("config", format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Check every field, reporting the first problem found.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] naming the offending field.
    pub fn validate(&self) -> SourceResult<()> {
        self.endpoint()?;
        self.paths()?;
        self.text_options()?;
        if self.parallelism == Some(0) {
            return Err(SourceError::config("parallelism", "must be at least 1"));
        }
        Ok(())
    }

    pub fn protocol(&self) -> SourceResult<Protocol> {
        if self.protocol.trim().is_empty() {
            return Err(SourceError::config("protocol", "is required"));
        }
        self.protocol
            .parse()
            .map_err(|message: String| SourceError::config("protocol", message))
    }

    /// Connection parameters, with the protocol's default port when unset.
    pub fn endpoint(&self) -> SourceResult<Endpoint> {
        let protocol = self.protocol()?;
        let host = required("host", &self.host)?;
        let username = required("username", &self.username)?;
        required("password", &self.password)?;
        let password = self.password.as_str();
        let port = self.port.unwrap_or_else(|| protocol.default_port());
        Ok(Endpoint::new(protocol, host, port, username, password)
            .with_timeout(Duration::from_millis(self.timeout)))
    }

    /// Configured path entries, trimmed, in configuration order.
    pub fn paths(&self) -> SourceResult<Vec<String>> {
        let paths = match &self.path {
            None => return Err(SourceError::config("path", "is required")),
            Some(PathSetting::Many(list)) => list.clone(),
            Some(PathSetting::One(raw)) => {
                let raw = raw.trim();
                if raw.starts_with('[') && raw.ends_with(']') {
                    serde_json::from_str(raw).map_err(|e| {
                        SourceError::config("path", format!("cannot parse path list {raw}: {e}"))
                    })?
                } else {
                    vec![raw.to_string()]
                }
            }
        };
        if paths.is_empty() {
            return Err(SourceError::config("path", "must name at least one path"));
        }
        paths
            .iter()
            .map(|p| required("path", p).map(str::to_string))
            .collect()
    }

    /// Decoder settings.
    pub fn text_options(&self) -> SourceResult<TextOptions> {
        Ok(TextOptions {
            encoding: self.encoding()?,
            compress: self.compress()?,
            delimiter: self.delimiter()?,
            skip_header: self.skip_header,
            null_format: self.null_format.clone(),
            columns: self.columns()?,
        })
    }

    /// Requested shard count; the number of CPUs when unset.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(num_cpus::get).max(1)
    }

    fn encoding(&self) -> SourceResult<TextEncoding> {
        match non_blank(self.encoding.as_deref()) {
            None => Ok(TextEncoding::default()),
            Some(name) => name
                .parse()
                .map_err(|message: String| SourceError::config("encoding", message)),
        }
    }

    fn compress(&self) -> SourceResult<Option<String>> {
        let Some(name) = non_blank(self.compress.as_deref()) else {
            return Ok(None);
        };
        match codec_by_name(name) {
            Some(codec) => Ok(Some(codec.name().to_string())),
            None => Err(SourceError::config(
                "compress",
                format!(
                    "unsupported compression [{name}], expected one of {:?}",
                    codec_names()
                ),
            )),
        }
    }

    /// One ASCII character; `csv` splits rows on a single byte.
    fn delimiter(&self) -> SourceResult<u8> {
        let Some(raw) = self.field_delimiter.as_deref() else {
            return Ok(b',');
        };
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => Ok(c as u8),
            (Some(_), None) => Err(SourceError::config(
                "fieldDelimiter",
                format!("[{raw}] is not a single-byte character"),
            )),
            _ => Err(SourceError::config(
                "fieldDelimiter",
                format!("must be exactly one character, got [{raw}]"),
            )),
        }
    }

    fn columns(&self) -> SourceResult<Option<Vec<ColumnSpec>>> {
        let Some(entries) = &self.column else {
            return Ok(None);
        };
        if matches!(entries.as_slice(), [ColumnEntry::Wildcard(star)] if star.trim() == "*") {
            return Ok(None);
        }
        if entries.is_empty() {
            return Err(SourceError::config("column", "must not be empty"));
        }
        entries
            .iter()
            .enumerate()
            .map(|(position, entry)| column_spec(position, entry))
            .collect::<SourceResult<Vec<_>>>()
            .map(Some)
    }
}

fn column_spec(position: usize, entry: &ColumnEntry) -> SourceResult<ColumnSpec> {
    let field = || format!("column[{position}]");
    let config = match entry {
        ColumnEntry::Field(config) => config,
        ColumnEntry::Wildcard(raw) => {
            return Err(SourceError::config(
                field(),
                format!("[{raw}] is only allowed as the sole entry \"*\""),
            ));
        }
    };
    let kind: ColumnType = match non_blank(config.kind.as_deref()) {
        None => return Err(SourceError::config(field(), "`type` is required")),
        Some(kind) => kind
            .parse()
            .map_err(|message: String| SourceError::config(field(), message))?,
    };
    let source = match (config.index, &config.value) {
        (Some(_), Some(_)) => {
            return Err(SourceError::config(
                field(),
                "`index` and `value` are mutually exclusive",
            ));
        }
        (None, None) => {
            return Err(SourceError::config(field(), "needs either `index` or `value`"));
        }
        (Some(index), None) => {
            let index = usize::try_from(index).map_err(|_| {
                SourceError::config(field(), format!("`index` must be >= 0, got {index}"))
            })?;
            ColumnSource::Index(index)
        }
        (None, Some(value)) => ColumnSource::Constant(value.clone()),
    };
    let format = match non_blank(config.format.as_deref()) {
        Some(pattern) if kind == ColumnType::Date => Some(
            pattern
                .parse::<DateFormat>()
                .map_err(|message| SourceError::config(field(), message))?,
        ),
        _ => None,
    };
    Ok(ColumnSpec {
        source,
        kind,
        format,
    })
}

fn required<'a>(field: &str, value: &'a str) -> SourceResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SourceError::config(field, "is required and must not be blank"));
    }
    Ok(value)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> serde_json::Value {
        serde_json::json!({
            "protocol": "sftp",
            "host": "files.example.com",
            "username": "etl",
            "password": "hunter2",
            "path": "/data/*.csv"
        })
    }

    fn with(key: &str, value: serde_json::Value) -> SourceResult<ReaderConfig> {
        let mut json = base();
        json[key] = value;
        ReaderConfig::from_json_str(&json.to_string())
    }

    fn field_of(err: SourceError) -> String {
        match err {
            SourceError::Config { field, .. } => field,
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_applied() {
        let config = ReaderConfig::from_json_str(&base().to_string()).unwrap();
        let endpoint = config.endpoint().unwrap();
        assert_eq!(endpoint.port, 22);
        assert_eq!(endpoint.timeout, Duration::from_millis(30_000));
        assert_eq!(config.paths().unwrap(), vec!["/data/*.csv"]);

        let options = config.text_options().unwrap();
        assert_eq!(options, TextOptions::default());
        assert!(config.parallelism() >= 1);
    }

    #[test]
    fn ftp_defaults_to_port_21() {
        let config = with("protocol", "FTP".into()).unwrap();
        assert_eq!(config.endpoint().unwrap().port, 21);
    }

    #[test]
    fn required_fields_are_named() {
        for key in ["host", "username", "password", "protocol"] {
            let err = with(key, "  ".into()).unwrap_err();
            assert_eq!(field_of(err), key);
        }
        assert_eq!(field_of(with("protocol", "scp".into()).unwrap_err()), "protocol");
    }

    #[test]
    fn path_forms() {
        let listed = with("path", serde_json::json!(["/a", " /b "])).unwrap();
        assert_eq!(listed.paths().unwrap(), vec!["/a", "/b"]);

        let legacy = with("path", r#"["/x/*", "/y"]"#.into()).unwrap();
        assert_eq!(legacy.paths().unwrap(), vec!["/x/*", "/y"]);

        assert_eq!(field_of(with("path", serde_json::json!([])).unwrap_err()), "path");
        assert_eq!(field_of(with("path", serde_json::json!(["/a", ""])).unwrap_err()), "path");
        assert_eq!(field_of(with("path", "[not json]".into()).unwrap_err()), "path");
    }

    #[test]
    fn delimiter_must_be_one_byte() {
        let tab = with("fieldDelimiter", "\t".into()).unwrap();
        assert_eq!(tab.text_options().unwrap().delimiter, b'\t');
        assert_eq!(
            field_of(with("fieldDelimiter", "||".into()).unwrap_err()),
            "fieldDelimiter"
        );
        assert_eq!(
            field_of(with("fieldDelimiter", "§".into()).unwrap_err()),
            "fieldDelimiter"
        );
    }

    #[test]
    fn encoding_and_compress_are_checked() {
        let latin = with("encoding", "ISO-8859-1".into()).unwrap();
        assert_eq!(latin.text_options().unwrap().encoding, TextEncoding::Latin1);
        assert_eq!(field_of(with("encoding", "EBCDIC".into()).unwrap_err()), "encoding");

        let blank = with("compress", "".into()).unwrap();
        assert_eq!(blank.text_options().unwrap().compress, None);
        assert_eq!(field_of(with("compress", "rar".into()).unwrap_err()), "compress");
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn compress_name_is_normalized() {
        let config = with("compress", "GZIP".into()).unwrap();
        assert_eq!(config.text_options().unwrap().compress.as_deref(), Some("gzip"));
    }

    #[test]
    fn columns() {
        let all = with("column", serde_json::json!(["*"])).unwrap();
        assert_eq!(all.text_options().unwrap().columns, None);

        let typed = with(
            "column",
            serde_json::json!([{"index": 2, "type": "long"}, {"value": "x", "type": "string"}]),
        )
        .unwrap();
        assert_eq!(
            typed.text_options().unwrap().columns.unwrap(),
            vec![
                ColumnSpec::new(ColumnSource::Index(2), ColumnType::Long),
                ColumnSpec::new(ColumnSource::Constant("x".into()), ColumnType::String),
            ]
        );

        for bad in [
            serde_json::json!([{"index": 0}]),
            serde_json::json!([{"index": 0, "value": "v", "type": "string"}]),
            serde_json::json!([{"type": "string"}]),
            serde_json::json!([{"index": -1, "type": "string"}]),
            serde_json::json!(["*", {"index": 0, "type": "string"}]),
            serde_json::json!([{"index": 0, "type": "date", "format": "yyyy-QQ"}]),
        ] {
            let err = with("column", bad).unwrap_err();
            assert!(field_of(err).starts_with("column["));
        }
    }

    #[test]
    fn date_columns_carry_their_format() {
        let config = with(
            "column",
            serde_json::json!([
                {"index": 0, "type": "date", "format": "yyyy-MM-dd"},
                {"index": 1, "type": "date"},
                {"index": 2, "type": "string", "format": "yyyy"},
            ]),
        )
        .unwrap();
        let columns = config.text_options().unwrap().columns.unwrap();

        assert_eq!(columns[0].kind, ColumnType::Date);
        assert_eq!(columns[0].format.as_ref().map(DateFormat::as_str), Some("%Y-%m-%d"));
        assert_eq!(columns[1].format, None);
        assert_eq!(columns[2].format, None);
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        assert_eq!(field_of(with("parallelism", 0.into()).unwrap_err()), "parallelism");
        assert_eq!(with("parallelism", 3.into()).unwrap().parallelism(), 3);
    }

    #[test]
    fn debug_redacts_password() {
        let config = ReaderConfig::from_json_str(&base().to_string()).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
