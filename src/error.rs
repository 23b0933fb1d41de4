//! Error taxonomy for source resolution and retrieval.
//!
//! Every fatal condition maps to exactly one [`ErrorCategory`], so callers can
//! decide how far an error propagates without string matching:
//!
//! - **Configuration** and **Resolution** errors stop the whole job before any
//!   shard runs.
//! - **Connection** errors stop only the shard that owns the session.
//! - Per-file transfer and decode failures never surface as [`SourceError`]; they
//!   are recorded by the [`DirtyRecordCollector`](crate::dirty::DirtyRecordCollector).

use std::fmt;

/// Coarse classification of a [`SourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Resolution,
    Connection,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Resolution => "resolution",
            ErrorCategory::Connection => "connection",
        };
        f.write_str(name)
    }
}

/// Fatal errors raised while configuring, resolving or connecting.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid configuration for `{field}`: {message}")]
    Config { field: String, message: String },

    #[error("directory not found: [{path}]")]
    DirectoryNotFound { path: String },

    #[error("permission denied listing directory: [{path}]")]
    PermissionDenied { path: String },

    #[error("no files to read, check the configured path: {paths:?}")]
    EmptySource { paths: Vec<String> },

    #[error("I/O error while resolving [{path}]: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to {username}@{host}:{port}: {reason}")]
    Connection {
        host: String,
        port: u16,
        username: String,
        reason: String,
    },

    #[error("connection to {host} lost while reading [{path}]: {reason}")]
    ConnectionLost {
        host: String,
        path: String,
        reason: String,
    },
}

impl SourceError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        SourceError::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            SourceError::Config { .. } => ErrorCategory::Configuration,
            SourceError::DirectoryNotFound { .. }
            | SourceError::PermissionDenied { .. }
            | SourceError::EmptySource { .. }
            | SourceError::Io { .. } => ErrorCategory::Resolution,
            SourceError::Connection { .. } | SourceError::ConnectionLost { .. } => {
                ErrorCategory::Connection
            }
        }
    }

    /// Whether this error aborts the whole job rather than a single shard.
    #[must_use]
    pub fn is_job_fatal(&self) -> bool {
        self.category() != ErrorCategory::Connection
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Failure to open a byte stream for one path.
///
/// Everything but `ConnectionLost` is recoverable: the file is skipped and
/// recorded as dirty. `ConnectionLost` invalidates the session for every
/// remaining path in the shard.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("file not found: [{path}]")]
    NotFound { path: String },

    #[error("permission denied reading file: [{path}]")]
    PermissionDenied { path: String },

    #[error("cannot open file [{path}]: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },
}

impl TransferError {
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransferError::ConnectionLost { .. })
    }

    /// Map a filesystem error for `path` onto the transfer outcome it represents.
    pub fn from_io(path: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => TransferError::NotFound {
                path: path.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => TransferError::PermissionDenied {
                path: path.to_string(),
            },
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::UnexpectedEof => TransferError::ConnectionLost {
                reason: format!("{path}: {err}"),
            },
            _ => TransferError::Unreadable {
                path: path.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// Reason a transport could not establish a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ConnectError {
    pub reason: String,
}

impl ConnectError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A file's bytes could not be turned into records.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("read failed at line {line}: {message}")]
    Read { line: u64, message: String },

    #[error("unsupported compression: {0}")]
    Compression(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_do_not_overlap() {
        assert_eq!(
            SourceError::config("host", "blank").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            SourceError::EmptySource { paths: vec![] }.category(),
            ErrorCategory::Resolution
        );
        let conn = SourceError::Connection {
            host: "h".into(),
            port: 22,
            username: "u".into(),
            reason: "refused".into(),
        };
        assert_eq!(conn.category(), ErrorCategory::Connection);
        assert!(!conn.is_job_fatal());
    }

    #[test]
    fn io_errors_map_to_transfer_outcomes() {
        let nf = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(
            TransferError::from_io("/a", &nf),
            TransferError::NotFound { path: "/a".into() }
        );
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(!TransferError::from_io("/a", &denied).is_fatal());
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(TransferError::from_io("/a", &reset).is_fatal());
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert!(TransferError::from_io("/a", &eof).is_fatal());
    }

    #[test]
    fn local_file_errors_stay_per_file() {
        for kind in [
            std::io::ErrorKind::IsADirectory,
            std::io::ErrorKind::NotADirectory,
            std::io::ErrorKind::InvalidInput,
        ] {
            let err = TransferError::from_io("/a/b", &std::io::Error::from(kind));
            assert!(!err.is_fatal(), "{kind:?} should not end the session");
            assert!(matches!(err, TransferError::Unreadable { ref path, .. } if path == "/a/b"));
        }
    }
}
