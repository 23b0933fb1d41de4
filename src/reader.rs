//! Shard reading: one worker drains its assigned paths through one session.
//!
//! A [`ShardReader`] walks its shard through
//! `Idle → Connecting → Reading(i) → Done`. A file that cannot be opened or
//! decoded becomes a dirty record and the shard moves on; a lost connection
//! stops the shard in `Failed`, keeping whatever was already delivered.
//!
//! The session is released before the shard reports `Done` or `Failed`.

use crate::dirty::{DirtyRecordCollector, FailureStage};
use crate::error::{SourceError, TransferError};
use crate::record::{Record, RecordDecoder, RecordSink};
use crate::transport::{ByteStream, Endpoint, RetrievalSession, Transports};
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where a shard is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    Idle,
    Connecting,
    /// Working on the file at this position in the shard.
    Reading(usize),
    Done,
    Failed,
}

impl fmt::Display for ShardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardState::Idle => f.write_str("idle"),
            ShardState::Connecting => f.write_str("connecting"),
            ShardState::Reading(i) => write!(f, "reading({i})"),
            ShardState::Done => f.write_str("done"),
            ShardState::Failed => f.write_str("failed"),
        }
    }
}

/// Lazily opens each path of a shard in order.
///
/// Yields one `(path, result)` per path. After a
/// [`TransferError::ConnectionLost`] it yields nothing more, since the session
/// can no longer serve the remaining paths.
pub struct Transfers<'s, 'p> {
    session: &'s mut RetrievalSession,
    paths: std::slice::Iter<'p, String>,
    lost: bool,
}

impl<'s, 'p> Transfers<'s, 'p> {
    pub fn new(session: &'s mut RetrievalSession, paths: &'p [String]) -> Self {
        Self {
            session,
            paths: paths.iter(),
            lost: false,
        }
    }
}

impl<'p> Iterator for Transfers<'_, 'p> {
    type Item = (&'p str, Result<ByteStream, TransferError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.lost {
            return None;
        }
        let path = self.paths.next()?;
        let opened = self.session.open_stream(path);
        if matches!(&opened, Err(err) if err.is_fatal()) {
            self.lost = true;
        }
        Some((path.as_str(), opened))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.lost {
            (0, Some(0))
        } else {
            (0, Some(self.paths.len()))
        }
    }
}

impl FusedIterator for Transfers<'_, '_> {}

/// Outcome of reading one shard.
#[derive(Debug)]
pub struct ShardReport {
    pub shard: usize,
    pub state: ShardState,
    pub files_read: usize,
    /// Files recorded as dirty instead of read.
    pub files_skipped: usize,
    /// Records delivered to the sink, including those of files that failed
    /// partway through decoding.
    pub records: u64,
    /// The connection error that failed the shard, if any.
    pub error: Option<SourceError>,
}

impl ShardReport {
    fn new(shard: usize) -> Self {
        Self {
            shard,
            state: ShardState::Idle,
            files_read: 0,
            files_skipped: 0,
            records: 0,
            error: None,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == ShardState::Done
    }
}

/// Counts what passes through to the worker's sink.
struct CountingSink<'a> {
    inner: &'a mut dyn RecordSink,
    sent: u64,
}

impl RecordSink for CountingSink<'_> {
    fn send(&mut self, record: Record) {
        self.sent += 1;
        self.inner.send(record);
    }

    fn flush(&mut self) {
        self.inner.flush();
    }
}

/// Reads shards against one endpoint. Shared by reference across workers;
/// each call to [`read`](ShardReader::read) opens its own session.
#[derive(Clone)]
pub struct ShardReader {
    endpoint: Endpoint,
    transports: Transports,
    decoder: Arc<dyn RecordDecoder>,
    dirty: DirtyRecordCollector,
}

impl fmt::Debug for ShardReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardReader")
            .field("endpoint", &self.endpoint)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl ShardReader {
    pub fn new(
        endpoint: Endpoint,
        transports: Transports,
        decoder: Arc<dyn RecordDecoder>,
        dirty: DirtyRecordCollector,
    ) -> Self {
        Self {
            endpoint,
            transports,
            decoder,
            dirty,
        }
    }

    /// Read every path of `shard` in order into `sink`.
    ///
    /// Never panics on transfer or decode problems; the returned report says
    /// how far the shard got and why it stopped.
    pub fn read(&self, shard: usize, paths: &[String], sink: &mut dyn RecordSink) -> ShardReport {
        let mut report = ShardReport::new(shard);
        info!(shard, files = paths.len(), "shard starting");

        report.state = ShardState::Connecting;
        let mut session = match RetrievalSession::establish(&self.endpoint, &self.transports) {
            Ok(session) => session,
            Err(err) => {
                report.state = ShardState::Failed;
                report.error = Some(err);
                return report;
            }
        };

        let mut sink = CountingSink {
            inner: sink,
            sent: 0,
        };
        let mut lost = None;
        for (index, (path, opened)) in Transfers::new(&mut session, paths).enumerate() {
            report.state = ShardState::Reading(index);
            match opened {
                Ok(stream) => {
                    let before = sink.sent;
                    let decoded = self.decoder.decode(path, stream, &mut sink, &self.dirty);
                    sink.flush();
                    match decoded {
                        Ok(_) => {
                            report.files_read += 1;
                            info!(shard, path, records = sink.sent - before, "file read");
                        }
                        Err(err) => {
                            report.files_skipped += 1;
                            self.dirty
                                .record(path, None, FailureStage::Decode, err.to_string());
                        }
                    }
                }
                Err(TransferError::ConnectionLost { reason }) => {
                    lost = Some((path.to_string(), reason));
                }
                Err(err) => {
                    report.files_skipped += 1;
                    self.dirty
                        .record(path, None, FailureStage::Transfer, err.to_string());
                }
            }
        }
        report.records = sink.sent;
        drop(session);

        match lost {
            Some((path, reason)) => {
                error!(shard, host = %self.endpoint.host, path = %path, reason = %reason, "connection lost, abandoning shard");
                report.state = ShardState::Failed;
                report.error = Some(SourceError::ConnectionLost {
                    host: self.endpoint.host.clone(),
                    path,
                    reason,
                });
            }
            None => {
                report.state = ShardState::Done;
                if report.files_skipped > 0 {
                    warn!(shard, skipped = report.files_skipped, "shard finished with skipped files");
                }
                info!(shard, files = report.files_read, records = report.records, "shard finished");
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::text::DelimitedTextDecoder;
    use crate::record::VecSink;
    use crate::transport::{FakeTransport, Protocol};

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn reader(fake: &FakeTransport, protocol: Protocol, dirty: &DirtyRecordCollector) -> ShardReader {
        ShardReader::new(
            Endpoint::new(protocol, "fake", protocol.default_port(), "u", "p"),
            Transports::uniform(fake.clone()),
            Arc::new(DelimitedTextDecoder::default()),
            dirty.clone(),
        )
    }

    #[test]
    fn transfers_stop_after_connection_lost() {
        let fake = FakeTransport::new()
            .with_file("/a", "1")
            .with_file("/b", "2")
            .drop_connection_after(1);
        let endpoint = Endpoint::new(Protocol::Sftp, "fake", 22, "u", "p");
        let mut session =
            RetrievalSession::establish(&endpoint, &Transports::uniform(fake.clone())).unwrap();
        let all = paths(&["/a", "/b", "/c"]);
        let mut transfers = Transfers::new(&mut session, &all);

        assert!(transfers.next().unwrap().1.is_ok());
        assert!(transfers.next().unwrap().1.err().unwrap().is_fatal());
        assert!(transfers.next().is_none());
        assert!(transfers.next().is_none());
        assert_eq!(fake.requested(), vec!["/a", "/b"]);
    }

    #[test]
    fn reads_every_file_and_flushes_each() {
        let fake = FakeTransport::new()
            .with_file("/a", "1\n2\n")
            .with_file("/b", "3\n");
        let dirty = DirtyRecordCollector::new();
        let mut sink = VecSink::new();
        let report = reader(&fake, Protocol::Sftp, &dirty).read(0, &paths(&["/a", "/b"]), &mut sink);

        assert_eq!(report.state, ShardState::Done);
        assert_eq!((report.files_read, report.records), (2, 3));
        assert_eq!(sink.flushes(), 2);
        assert_eq!(fake.live_sessions(), 0);
        assert!(dirty.summary().is_empty());
    }

    #[test]
    fn refused_connection_fails_without_dirty_records() {
        let fake = FakeTransport::new()
            .with_file("/a", "1\n")
            .refuse_connections("auth failed");
        let dirty = DirtyRecordCollector::new();
        let mut sink = VecSink::new();
        let report = reader(&fake, Protocol::Sftp, &dirty).read(3, &paths(&["/a"]), &mut sink);

        assert_eq!(report.state, ShardState::Failed);
        assert_eq!(report.shard, 3);
        assert_eq!(report.records, 0);
        assert!(matches!(report.error, Some(SourceError::Connection { .. })));
        assert!(dirty.summary().is_empty());
        assert!(fake.requested().is_empty());
    }

    #[test]
    fn state_names() {
        assert_eq!(ShardState::Reading(4).to_string(), "reading(4)");
        assert_eq!(ShardState::Failed.to_string(), "failed");
    }
}
