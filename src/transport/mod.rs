//! Byte retrieval: the narrow "give me a stream for this path" capability.
//!
//! The wire protocols themselves live outside this crate. A host plugs them in
//! through two traits, one per transport shape:
//!
//! - [`SessionConnector`] / [`Session`] for protocols that need a persistent,
//!   authenticated connection (`sftp`)
//! - [`PerCallFetcher`] for protocols that deliver each file through a
//!   self-contained call (`ftp`)
//!
//! A worker resolves the shape once, when it builds its [`RetrievalSession`],
//! and from then on only calls [`RetrievalSession::open_stream`].
//!
//! Two implementations ship with the crate: [`LocalTransport`], which serves
//! the local filesystem through both shapes, and [`FakeTransport`], an
//! in-memory transport with failure injection for tests.
//!
//! ## Session Lifecycle
//!
//! A `RetrievalSession` is created by exactly one worker and is never shared.
//! Dropping it releases the underlying session, so a shard that finishes,
//! skips files, or aborts always gives its connection back.

pub mod fake;
pub mod local;

pub use fake::FakeTransport;
pub use local::LocalTransport;

use crate::error::{ConnectError, SourceError, SourceResult, TransferError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// An open, readable file.
pub type ByteStream = Box<dyn Read + Send>;

/// Connect timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Transfer scheme named in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Sftp,
    Ftp,
}

impl Protocol {
    /// Whether this protocol holds one connection open across files.
    #[must_use]
    pub fn is_session_based(self) -> bool {
        matches!(self, Protocol::Sftp)
    }

    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Sftp => 22,
            Protocol::Ftp => 21,
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sftp" => Ok(Protocol::Sftp),
            "ftp" => Ok(Protocol::Ftp),
            other => Err(format!("unsupported protocol [{other}], expected sftp or ftp")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Sftp => "sftp",
            Protocol::Ftp => "ftp",
        })
    }
}

/// Where and as whom to connect.
#[derive(Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    password: String,
    pub protocol: Protocol,
    pub timeout: Duration,
}

impl Endpoint {
    pub fn new(
        protocol: Protocol,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            protocol,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The secret, for transports that need to authenticate.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("protocol", &self.protocol)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A live connection that can serve one transfer at a time.
pub trait Session: Send {
    /// Open `path` for reading.
    ///
    /// # Errors
    ///
    /// `NotFound`, `PermissionDenied` or `Unreadable` for a bad path,
    /// `ConnectionLost` when the session itself is no longer usable.
    fn open(&mut self, path: &str) -> Result<ByteStream, TransferError>;

    /// Release the connection. Called exactly once, when the owning
    /// [`RetrievalSession`] is dropped.
    fn close(&mut self) {}
}

/// Establishes [`Session`]s for session-based protocols.
pub trait SessionConnector: Send + Sync {
    /// Connect and authenticate, giving up after `endpoint.timeout`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] describing why the endpoint is unreachable.
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Session>, ConnectError>;
}

/// Fetches files for protocols with no persistent session.
pub trait PerCallFetcher: Send + Sync {
    /// Open `path` on `endpoint` for reading.
    ///
    /// # Errors
    ///
    /// Same outcomes as [`Session::open`].
    fn fetch(&self, endpoint: &Endpoint, path: &str) -> Result<ByteStream, TransferError>;
}

/// The pair of transport implementations a job may pick from.
#[derive(Clone)]
pub struct Transports {
    pub sessions: Arc<dyn SessionConnector>,
    pub per_call: Arc<dyn PerCallFetcher>,
}

impl Transports {
    pub fn new(sessions: Arc<dyn SessionConnector>, per_call: Arc<dyn PerCallFetcher>) -> Self {
        Self { sessions, per_call }
    }

    /// Use one value for both shapes.
    pub fn uniform<T>(transport: T) -> Self
    where
        T: SessionConnector + PerCallFetcher + 'static,
    {
        let transport = Arc::new(transport);
        Self {
            sessions: transport.clone(),
            per_call: transport,
        }
    }

    /// Loopback transports over the local filesystem.
    #[must_use]
    pub fn local() -> Self {
        Self::uniform(LocalTransport::new())
    }
}

impl fmt::Debug for Transports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transports")
    }
}

/// One worker's handle on the remote source.
pub enum RetrievalSession {
    SessionBased {
        endpoint: Endpoint,
        session: Box<dyn Session>,
    },
    StatelessPerCall {
        endpoint: Endpoint,
        fetcher: Arc<dyn PerCallFetcher>,
    },
}

impl RetrievalSession {
    /// Pick the transport shape for `endpoint.protocol` and, if it needs one,
    /// connect.
    ///
    /// # Errors
    ///
    /// [`SourceError::Connection`] naming host, port and user. The password is
    /// never included.
    pub fn establish(endpoint: &Endpoint, transports: &Transports) -> SourceResult<Self> {
        if !endpoint.protocol.is_session_based() {
            debug!(host = %endpoint.host, protocol = %endpoint.protocol, "using per-call transport");
            return Ok(RetrievalSession::StatelessPerCall {
                endpoint: endpoint.clone(),
                fetcher: Arc::clone(&transports.per_call),
            });
        }

        match transports.sessions.connect(endpoint) {
            Ok(session) => {
                info!(
                    host = %endpoint.host,
                    port = endpoint.port,
                    username = %endpoint.username,
                    "session established"
                );
                Ok(RetrievalSession::SessionBased {
                    endpoint: endpoint.clone(),
                    session,
                })
            }
            Err(err) => {
                error!(
                    host = %endpoint.host,
                    port = endpoint.port,
                    username = %endpoint.username,
                    reason = %err,
                    "failed to connect"
                );
                Err(SourceError::Connection {
                    host: endpoint.host.clone(),
                    port: endpoint.port,
                    username: endpoint.username.clone(),
                    reason: err.reason,
                })
            }
        }
    }

    /// Open one file for reading.
    ///
    /// # Errors
    ///
    /// See [`TransferError`]; only `ConnectionLost` is fatal for the session.
    pub fn open_stream(&mut self, path: &str) -> Result<ByteStream, TransferError> {
        match self {
            RetrievalSession::SessionBased { session, .. } => session.open(path),
            RetrievalSession::StatelessPerCall { endpoint, fetcher } => {
                fetcher.fetch(endpoint, path)
            }
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            RetrievalSession::SessionBased { endpoint, .. }
            | RetrievalSession::StatelessPerCall { endpoint, .. } => endpoint,
        }
    }

    #[must_use]
    pub fn is_session_based(&self) -> bool {
        matches!(self, RetrievalSession::SessionBased { .. })
    }
}

impl Drop for RetrievalSession {
    fn drop(&mut self) {
        if let RetrievalSession::SessionBased { endpoint, session } = self {
            session.close();
            debug!(host = %endpoint.host, "session released");
        }
    }
}
