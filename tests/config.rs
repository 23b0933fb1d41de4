use anyhow::Result;
use ironferry::ReaderConfig;
use ironferry::error::SourceError;
use ironferry::io::text::{ColumnSource, ColumnType, TextEncoding};
use ironferry::transport::Protocol;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const FULL_JOB: &str = r#"{
    "protocol": "sftp",
    "host": "files.example.com",
    "port": 2222,
    "username": "etl",
    "password": "hunter2",
    "timeout": 5000,
    "path": ["/data/in/*.csv", "/data/extra.csv"],
    "encoding": "ISO-8859-1",
    "fieldDelimiter": "\t",
    "skipHeader": true,
    "nullFormat": "\\N",
    "column": [{"index": 0, "type": "long"}, {"value": "batch-7", "type": "string"}],
    "parallelism": 4
}"#;

#[test]
fn test_full_job_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(FULL_JOB.as_bytes())?;
    let config = ReaderConfig::from_json_file(file.path())?;

    let endpoint = config.endpoint()?;
    assert_eq!(endpoint.protocol, Protocol::Sftp);
    assert_eq!(endpoint.port, 2222);
    assert_eq!(endpoint.timeout, Duration::from_millis(5000));
    assert_eq!(endpoint.password(), "hunter2");
    assert_eq!(config.paths()?, vec!["/data/in/*.csv", "/data/extra.csv"]);
    assert_eq!(config.parallelism(), 4);

    let options = config.text_options()?;
    assert_eq!(options.encoding, TextEncoding::Latin1);
    assert_eq!(options.delimiter, b'\t');
    assert!(options.skip_header);
    assert_eq!(options.null_format.as_deref(), Some("\\N"));
    let columns = options.columns.expect("projection");
    assert_eq!(columns[0].source, ColumnSource::Index(0));
    assert_eq!(columns[1].source, ColumnSource::Constant("batch-7".into()));
    Ok(())
}

#[test]
fn test_missing_file_is_a_config_error() {
    let err = ReaderConfig::from_json_file("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, SourceError::Config { .. }));
}

#[test]
fn test_malformed_json_is_a_config_error() {
    let err = ReaderConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, SourceError::Config { ref field, .. } if field == "config"));
}

#[test]
fn test_missing_path_is_reported() {
    let err = ReaderConfig::from_json_str(
        r#"{"protocol": "ftp", "host": "h", "username": "u", "password": "p"}"#,
    )
    .unwrap_err();
    assert!(matches!(err, SourceError::Config { ref field, .. } if field == "path"));
}

#[test]
fn test_errors_never_echo_the_password() {
    let err = ReaderConfig::from_json_str(
        r#"{"protocol": "sftp", "host": "", "username": "u", "password": "hunter2", "path": "/x"}"#,
    )
    .unwrap_err();
    assert!(!err.to_string().contains("hunter2"));
}

#[test]
fn test_date_column_with_format_is_accepted() -> Result<()> {
    let config = ReaderConfig::from_json_str(
        r#"{
            "protocol": "ftp", "host": "h", "username": "u", "password": "p", "path": "/x",
            "column": [{"index": 0, "type": "date", "format": "yyyy-MM-dd"}]
        }"#,
    )?;

    let columns = config.text_options()?.columns.expect("projection");
    assert_eq!(columns[0].kind, ColumnType::Date);
    assert_eq!(columns[0].format.as_ref().map(|f| f.as_str()), Some("%Y-%m-%d"));
    Ok(())
}

#[test]
fn test_unsupported_date_format_names_the_column() {
    let err = ReaderConfig::from_json_str(
        r#"{
            "protocol": "ftp", "host": "h", "username": "u", "password": "p", "path": "/x",
            "column": [{"index": 0, "type": "string"}, {"index": 1, "type": "date", "format": "ww/yyyy"}]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, SourceError::Config { ref field, .. } if field == "column[1]"));
}
