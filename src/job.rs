//! The read job: resolve, partition, then read every shard in parallel.
//!
//! ```no_run
//! use ironferry::config::ReaderConfig;
//! use ironferry::job::ReadJob;
//! use ironferry::record::VecSink;
//! use ironferry::transport::Transports;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ReaderConfig::from_json_file("job.json")?;
//! let job = ReadJob::new(config, Transports::local())?;
//! let report = job.run(|_shard| VecSink::new())?;
//!
//! println!("{} records, {}", report.records(), report.dirty);
//! # Ok(())
//! # }
//! ```
//!
//! Configuration and resolution errors abort [`ReadJob::run`] before any shard
//! starts. A shard that loses its connection is reported as failed in the
//! [`JobReport`] while the other shards keep going.

use crate::config::ReaderConfig;
use crate::dirty::{DEFAULT_SAMPLE_LIMIT, DirtyRecordCollector, DirtySummary};
use crate::error::SourceResult;
use crate::io::sources::build_source_list;
use crate::io::text::DelimitedTextDecoder;
use crate::partition::split_into_shards;
use crate::reader::{ShardReader, ShardReport};
use crate::record::{RecordDecoder, RecordSink};
use crate::transport::{Endpoint, Transports};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ReadJob {
    config: ReaderConfig,
    endpoint: Endpoint,
    paths: Vec<String>,
    transports: Transports,
    decoder: Arc<dyn RecordDecoder>,
    sample_limit: usize,
}

impl fmt::Debug for ReadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadJob")
            .field("endpoint", &self.endpoint)
            .field("paths", &self.paths)
            .field("parallelism", &self.config.parallelism())
            .finish_non_exhaustive()
    }
}

impl ReadJob {
    /// Validate `config` and prepare a job that decodes delimited text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`](crate::error::SourceError::Config) for an
    /// invalid configuration.
    pub fn new(config: ReaderConfig, transports: Transports) -> SourceResult<Self> {
        config.validate()?;
        let endpoint = config.endpoint()?;
        let paths = config.paths()?;
        let decoder = Arc::new(DelimitedTextDecoder::new(config.text_options()?));
        Ok(Self {
            config,
            endpoint,
            paths,
            transports,
            decoder,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        })
    }

    /// Replace the default delimited-text decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn RecordDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// How many dirty records each run keeps as samples.
    #[must_use]
    pub fn with_dirty_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Resolve the configured paths and split them into shards.
    ///
    /// # Errors
    ///
    /// Any resolution error, including an empty result.
    pub fn plan(&self) -> SourceResult<Vec<Vec<String>>> {
        let sources = build_source_list(&self.paths)?;
        let shards = split_into_shards(sources, self.config.parallelism());
        info!(
            shards = shards.len(),
            parallelism = self.config.parallelism(),
            "planned read"
        );
        Ok(shards)
    }

    /// Plan, then read every shard on its own worker. `make_sink` is called
    /// once per shard with the shard index.
    ///
    /// # Errors
    ///
    /// Resolution errors. Connection errors stay inside the report.
    pub fn run<S, F>(&self, make_sink: F) -> SourceResult<JobReport<S>>
    where
        S: RecordSink,
        F: Fn(usize) -> S + Send + Sync,
    {
        let shards = self.plan()?;
        let dirty = DirtyRecordCollector::with_sample_limit(self.sample_limit);
        let reader = ShardReader::new(
            self.endpoint.clone(),
            self.transports.clone(),
            Arc::clone(&self.decoder),
            dirty.clone(),
        );

        let work = |(index, paths): (usize, Vec<String>)| {
            let mut sink = make_sink(index);
            let report = reader.read(index, &paths, &mut sink);
            ShardOutcome { report, sink }
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(shards.len())
            .thread_name(|i| format!("ironferry-shard-{i}"))
            .build();
        let outcomes: Vec<ShardOutcome<S>> = match pool {
            Ok(pool) => pool.install(|| shards.into_par_iter().enumerate().map(work).collect()),
            Err(err) => {
                warn!(error = %err, "cannot build shard pool, using the global pool");
                shards.into_par_iter().enumerate().map(work).collect()
            }
        };

        let report = JobReport {
            shards: outcomes,
            dirty: dirty.summary(),
        };
        info!(
            shards = report.shards.len(),
            failed = report.failed_shards().len(),
            records = report.records(),
            dirty = report.dirty.total,
            "read finished"
        );
        Ok(report)
    }
}

/// One shard's report together with the sink it filled.
#[derive(Debug)]
pub struct ShardOutcome<S> {
    pub report: ShardReport,
    pub sink: S,
}

/// Result of [`ReadJob::run`], with shards in plan order.
#[derive(Debug)]
pub struct JobReport<S> {
    pub shards: Vec<ShardOutcome<S>>,
    pub dirty: DirtySummary,
}

impl<S> JobReport<S> {
    /// True when every shard reached `Done`. Dirty records do not count as
    /// failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.shards.iter().all(|s| s.report.is_done())
    }

    #[must_use]
    pub fn records(&self) -> u64 {
        self.shards.iter().map(|s| s.report.records).sum()
    }

    #[must_use]
    pub fn files_read(&self) -> usize {
        self.shards.iter().map(|s| s.report.files_read).sum()
    }

    #[must_use]
    pub fn files_skipped(&self) -> usize {
        self.shards.iter().map(|s| s.report.files_skipped).sum()
    }

    #[must_use]
    pub fn failed_shards(&self) -> Vec<&ShardReport> {
        self.shards
            .iter()
            .map(|s| &s.report)
            .filter(|r| !r.is_done())
            .collect()
    }

    #[must_use]
    pub fn into_sinks(self) -> Vec<S> {
        self.shards.into_iter().map(|s| s.sink).collect()
    }
}
