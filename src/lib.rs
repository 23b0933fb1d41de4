//! # Ironferry
//!
//! Resolve, shard and stream remote file sources into record pipelines.
//!
//! A read job takes a list of path entries, literal or with `*` / `?`
//! wildcards, expands them into a sorted, de-duplicated set of files, splits
//! that set into balanced shards, and reads every shard on its own worker
//! through its own connection. Files are decoded into [`Record`]s and handed to
//! a [`RecordSink`] per shard.
//!
//! ## Quick Start
//!
//! ```
//! use ironferry::job::ReadJob;
//! use ironferry::record::VecSink;
//! use ironferry::testing::{SourceTree, local_config};
//! use ironferry::transport::Transports;
//!
//! # fn main() -> anyhow::Result<()> {
//! let tree = SourceTree::new()?;
//! tree.file("data/a.csv", "1,alice\n2,bob\n")?;
//! tree.file("data/b.csv", "3,carol\n")?;
//!
//! let mut config = local_config(vec![tree.path("data/*.csv")]);
//! config.parallelism = Some(2);
//!
//! let job = ReadJob::new(config, Transports::local())?;
//! let report = job.run(|_shard| VecSink::new())?;
//!
//! assert!(report.is_success());
//! assert_eq!(report.records(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Pieces
//!
//! - [`io::pattern`] parses a path entry into a [`PathSpec`]
//! - [`io::walk`] and [`io::sources`] expand entries into the source list
//! - [`partition`] splits the source list into shards
//! - [`transport`] abstracts the session-based (`sftp`) and per-call (`ftp`)
//!   ways of fetching bytes
//! - [`reader`] drains one shard through one session
//! - [`job`] drives the whole read in parallel
//! - [`dirty`] collects per-file and per-row failures that do not stop the job
//!
//! ## Errors
//!
//! Fatal errors are [`SourceError`]s, classified by [`ErrorCategory`]:
//! configuration and resolution errors stop the job, connection errors stop
//! one shard. Everything else is a dirty record.
//!
//! ## Feature Flags
//!
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//!   `compression-xz`: built-in codecs, all enabled by default

pub mod config;
pub mod dirty;
pub mod error;
pub mod io;
pub mod job;
pub mod partition;
pub mod reader;
pub mod record;
pub mod testing;
pub mod transport;

pub use config::ReaderConfig;
pub use dirty::{DirtyRecord, DirtyRecordCollector, DirtySummary, FailureStage};
pub use error::{ErrorCategory, SourceError, SourceResult, TransferError};
pub use io::pattern::PathSpec;
pub use io::sources::build_source_list;
pub use job::{JobReport, ReadJob};
pub use partition::split_into_shards;
pub use reader::{ShardReader, ShardReport, ShardState};
pub use record::{Column, Record, RecordDecoder, RecordSink};
pub use transport::{Endpoint, Protocol, RetrievalSession, Transports};
