//! Loopback transport over the local filesystem.
//!
//! Serves both transport shapes so a job can run end to end against files the
//! resolver enumerated locally. Only loopback hosts are accepted; anything else
//! needs a real protocol implementation.

use crate::error::{ConnectError, TransferError};
use crate::transport::{ByteStream, Endpoint, PerCallFetcher, Session, SessionConnector};
use std::fs::File;
use std::io::BufReader;
use tracing::debug;

const LOOPBACK_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "::1", "[::1]"];

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

impl LocalTransport {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn open_local(path: &str) -> Result<ByteStream, TransferError> {
    let file = File::open(path).map_err(|e| TransferError::from_io(path, &e))?;
    Ok(Box::new(BufReader::new(file)))
}

fn is_loopback(host: &str) -> bool {
    LOOPBACK_HOSTS.iter().any(|h| h.eq_ignore_ascii_case(host))
}

impl SessionConnector for LocalTransport {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Session>, ConnectError> {
        if !is_loopback(&endpoint.host) {
            return Err(ConnectError::new(format!(
                "local transport only serves loopback hosts, not [{}]",
                endpoint.host
            )));
        }
        Ok(Box::new(LocalSession { open: true }))
    }
}

impl PerCallFetcher for LocalTransport {
    fn fetch(&self, endpoint: &Endpoint, path: &str) -> Result<ByteStream, TransferError> {
        if !is_loopback(&endpoint.host) {
            return Err(TransferError::ConnectionLost {
                reason: format!("[{}] is not a loopback host", endpoint.host),
            });
        }
        open_local(path)
    }
}

#[derive(Debug)]
struct LocalSession {
    open: bool,
}

impl Session for LocalSession {
    fn open(&mut self, path: &str) -> Result<ByteStream, TransferError> {
        if !self.open {
            return Err(TransferError::ConnectionLost {
                reason: "session already closed".to_string(),
            });
        }
        open_local(path)
    }

    fn close(&mut self) {
        debug!("closing local session");
        self.open = false;
    }
}
