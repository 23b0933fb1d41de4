//! In-memory transport for tests.
//!
//! Files live in a map keyed by path. Failures are injected with the builder
//! methods, and counters record how many sessions were opened and released so
//! tests can check the session lifecycle.

use crate::error::{ConnectError, TransferError};
use crate::transport::{ByteStream, Endpoint, PerCallFetcher, Session, SessionConnector};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct FakeState {
    files: HashMap<String, Vec<u8>>,
    denied: HashSet<String>,
    refuse: Option<String>,
    /// Transfers allowed before every session reports a lost connection.
    lose_after: Option<usize>,
    transfers: usize,
    connects: usize,
    releases: usize,
    requested: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `contents` at `path`.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.lock().files.insert(path.into(), contents.into());
        self
    }

    /// Report `PermissionDenied` for `path`, even if it exists.
    #[must_use]
    pub fn deny(self, path: impl Into<String>) -> Self {
        self.lock().denied.insert(path.into());
        self
    }

    /// Fail every connection attempt with `reason`.
    #[must_use]
    pub fn refuse_connections(self, reason: impl Into<String>) -> Self {
        self.lock().refuse = Some(reason.into());
        self
    }

    /// Let `transfers` files through, then report a lost connection.
    #[must_use]
    pub fn drop_connection_after(self, transfers: usize) -> Self {
        self.lock().lose_after = Some(transfers);
        self
    }

    /// Sessions successfully established.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    /// Sessions closed.
    #[must_use]
    pub fn releases(&self) -> usize {
        self.lock().releases
    }

    #[must_use]
    pub fn live_sessions(&self) -> usize {
        let state = self.lock();
        state.connects - state.releases
    }

    /// Every path requested so far, in request order.
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.lock().requested.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transfer(&self, path: &str) -> Result<ByteStream, TransferError> {
        let mut state = self.lock();
        state.requested.push(path.to_string());
        if matches!(state.lose_after, Some(limit) if state.transfers >= limit) {
            return Err(TransferError::ConnectionLost {
                reason: "connection reset by peer".to_string(),
            });
        }
        state.transfers += 1;
        if state.denied.contains(path) {
            return Err(TransferError::PermissionDenied {
                path: path.to_string(),
            });
        }
        match state.files.get(path) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(TransferError::NotFound {
                path: path.to_string(),
            }),
        }
    }
}

impl SessionConnector for FakeTransport {
    fn connect(&self, _endpoint: &Endpoint) -> Result<Box<dyn Session>, ConnectError> {
        let mut state = self.lock();
        if let Some(reason) = &state.refuse {
            return Err(ConnectError::new(reason.clone()));
        }
        state.connects += 1;
        drop(state);
        Ok(Box::new(FakeSession {
            transport: self.clone(),
            closed: false,
        }))
    }
}

impl PerCallFetcher for FakeTransport {
    fn fetch(&self, _endpoint: &Endpoint, path: &str) -> Result<ByteStream, TransferError> {
        self.transfer(path)
    }
}

struct FakeSession {
    transport: FakeTransport,
    closed: bool,
}

impl Session for FakeSession {
    fn open(&mut self, path: &str) -> Result<ByteStream, TransferError> {
        if self.closed {
            return Err(TransferError::ConnectionLost {
                reason: "session closed".to_string(),
            });
        }
        self.transport.transfer(path)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.lock().releases += 1;
        }
    }
}
