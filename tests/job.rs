use anyhow::Result;
use ironferry::error::{ErrorCategory, SourceError};
use ironferry::job::ReadJob;
use ironferry::reader::ShardState;
use ironferry::record::{Column, DiscardSink, Record, RecordSink, VecSink};
use ironferry::testing::{
    RAGGED_CSV, SAMPLE_ORDERS_CSV, SourceTree, local_config, local_ftp_config, numbered_lines,
};
use ironferry::transport::{FakeTransport, Transports};
use ironferry::{ReaderConfig, config::ColumnConfig, config::ColumnEntry};
use std::collections::BTreeSet;

#[test]
fn test_reads_every_resolved_file_once() -> Result<()> {
    let tree = SourceTree::new()?;
    for i in 0..7 {
        tree.file(&format!("in/{i}.txt"), numbered_lines(i + 1))?;
    }
    tree.file("in/skip.md", "no\n")?;

    let mut config = local_config(vec![tree.path("in/*.txt")]);
    config.parallelism = Some(3);
    let job = ReadJob::new(config, Transports::local())?;

    let plan = job.plan()?;
    assert_eq!(plan.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 3]);

    let report = job.run(|_| VecSink::new())?;
    assert!(report.is_success());
    assert_eq!(report.shards.len(), 3);
    assert_eq!(report.files_read(), 7);
    assert_eq!(report.records(), (1..=7).sum::<u64>());
    assert!(report.dirty.is_empty());

    let seen: BTreeSet<String> = report
        .into_sinks()
        .into_iter()
        .flat_map(VecSink::into_records)
        .map(|r| r.source)
        .collect();
    assert_eq!(seen.len(), 7);
    Ok(())
}

#[test]
fn test_shards_keep_plan_order() -> Result<()> {
    let tree = SourceTree::new()?;
    for name in ["a", "b", "c", "d"] {
        tree.file(&format!("{name}.csv"), "1\n")?;
    }
    let mut config = local_ftp_config(vec![tree.path("*.csv")]);
    config.parallelism = Some(4);

    let report = ReadJob::new(config, Transports::local())?.run(|shard| TaggedSink {
        shard,
        inner: VecSink::new(),
    })?;
    for (index, outcome) in report.shards.iter().enumerate() {
        assert_eq!(outcome.report.shard, index);
        assert_eq!(outcome.sink.shard, index);
        assert_eq!(outcome.sink.inner.records().len(), 1);
    }
    Ok(())
}

struct TaggedSink {
    shard: usize,
    inner: VecSink,
}

impl RecordSink for TaggedSink {
    fn send(&mut self, record: Record) {
        self.inner.send(record);
    }
}

#[test]
fn test_typed_columns_and_dirty_rows() -> Result<()> {
    let tree = SourceTree::new()?;
    tree.file("orders.csv", SAMPLE_ORDERS_CSV)?;
    tree.file("ragged.csv", RAGGED_CSV)?;

    let mut config = local_config(vec![tree.path("orders.csv"), tree.path("ragged.csv")]);
    config.parallelism = Some(1);
    config.column = Some(vec![
        ColumnEntry::Field(ColumnConfig {
            kind: Some("long".into()),
            index: Some(0),
            ..ColumnConfig::default()
        }),
        ColumnEntry::Field(ColumnConfig {
            kind: Some("string".into()),
            value: Some("eu".into()),
            ..ColumnConfig::default()
        }),
    ]);

    let report = ReadJob::new(config, Transports::local())?.run(|_| VecSink::new())?;
    assert!(report.is_success());
    // header "id" and "x" do not parse as long
    assert_eq!(report.dirty.convert, 2);
    assert_eq!(report.records(), 4 + 2);

    let sinks = report.into_sinks();
    let first = &sinks[0].records()[0];
    assert_eq!(first.columns, vec![Column::Long(1), Column::String("eu".into())]);
    Ok(())
}

#[test]
fn test_skip_header_and_null_format() -> Result<()> {
    let tree = SourceTree::new()?;
    tree.file("orders.csv", SAMPLE_ORDERS_CSV)?;

    let json = serde_json::json!({
        "protocol": "sftp",
        "host": "localhost",
        "username": "reader",
        "password": "pw",
        "path": tree.path("orders.csv"),
        "skipHeader": true,
        "column": [{"index": 2, "type": "double"}, {"index": 3, "type": "boolean"}]
    });
    let config = ReaderConfig::from_json_str(&json.to_string())?;
    let report = ReadJob::new(config, Transports::local())?.run(|_| VecSink::new())?;

    let rows: Vec<Vec<Column>> = report
        .into_sinks()
        .into_iter()
        .flat_map(VecSink::into_records)
        .map(|r| r.columns)
        .collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], vec![Column::Double(10.5), Column::Bool(true)]);
    assert_eq!(rows[2], vec![Column::Null, Column::Bool(true)]);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn test_compressed_sources_by_extension_and_by_setting() -> Result<()> {
    let tree = SourceTree::new()?;
    tree.compressed_file("gz/a.csv.gz", "1\n2\n")?;
    let renamed = tree.compressed_file("named/b.gz", "3\n")?;
    std::fs::rename(&renamed, tree.path("named/b.dat"))?;

    let by_extension = local_config(vec![tree.path("gz/*.gz")]);
    let report = ReadJob::new(by_extension, Transports::local())?.run(|_| DiscardSink)?;
    assert_eq!(report.records(), 2);

    let mut by_setting = local_config(vec![tree.path("named/b.dat")]);
    by_setting.compress = Some("gzip".into());
    let report = ReadJob::new(by_setting, Transports::local())?.run(|_| DiscardSink)?;
    assert_eq!(report.records(), 1);
    Ok(())
}

#[test]
fn test_resolution_errors_abort_before_any_shard() -> Result<()> {
    let tree = SourceTree::new()?;
    tree.file("in/a.txt", "")?;
    let fake = FakeTransport::new();

    let config = local_config(vec![tree.path("in/*.csv")]);
    let err = ReadJob::new(config, Transports::uniform(fake.clone()))?
        .run(|_| VecSink::new())
        .unwrap_err();
    assert!(matches!(err, SourceError::EmptySource { .. }));
    assert_eq!(fake.connects(), 0);
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let mut config = local_config(vec!["/tmp".into()]);
    config.field_delimiter = Some("::".into());
    let err = ReadJob::new(config, Transports::local()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_connection_failures_stay_per_shard() -> Result<()> {
    let tree = SourceTree::new()?;
    let a = tree.file("a.csv", "1\n")?;
    let b = tree.file("b.csv", "2\n")?;
    let fake = FakeTransport::new()
        .with_file(a, "1\n")
        .with_file(b, "2\n")
        .refuse_connections("host key mismatch");

    let mut config = local_config(vec![tree.path("*.csv")]);
    config.parallelism = Some(2);
    let report = ReadJob::new(config, Transports::uniform(fake.clone()))?.run(|_| VecSink::new())?;

    assert!(!report.is_success());
    assert_eq!(report.failed_shards().len(), 2);
    assert!(report.failed_shards().iter().all(|r| r.state == ShardState::Failed));
    assert_eq!(report.records(), 0);
    assert!(report.dirty.is_empty());
    Ok(())
}

#[test]
fn test_fake_transport_serves_resolved_paths_and_releases_sessions() -> Result<()> {
    let tree = SourceTree::new()?;
    let mut fake = FakeTransport::new();
    for i in 0..5 {
        let path = tree.file(&format!("{i}.csv"), "")?;
        fake = fake.with_file(path, format!("{i}\n"));
    }

    let mut config = local_config(vec![tree.path("*.csv")]);
    config.parallelism = Some(2);
    let report = ReadJob::new(config, Transports::uniform(fake.clone()))?.run(|_| VecSink::new())?;

    assert!(report.is_success());
    assert_eq!(report.records(), 5);
    assert_eq!(fake.connects(), 2);
    assert_eq!(fake.live_sessions(), 0);
    let mut requested = fake.requested();
    requested.sort();
    assert_eq!(requested, (0..5).map(|i| tree.path(&format!("{i}.csv"))).collect::<Vec<_>>());
    Ok(())
}
