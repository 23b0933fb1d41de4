//! Sample file contents and ready-made configurations.

use crate::config::ReaderConfig;
use crate::transport::Protocol;

/// Four orders with a header row; the third has a blank amount.
pub const SAMPLE_ORDERS_CSV: &str = "\
id,customer,amount,paid
1,alice,10.5,true
2,bob,3,false
3,carol,,true
4,dave,7.25,false
";

/// Rows of varying width, one with a non-numeric first field.
pub const RAGGED_CSV: &str = "\
1,a
2,b,extra
x,c
";

/// Username and password used by the sample configurations.
pub const SAMPLE_USERNAME: &str = "reader";
pub const SAMPLE_PASSWORD: &str = "s3cr3t-pw";

/// An `sftp` configuration against `localhost`, served by
/// [`LocalTransport`](crate::transport::LocalTransport).
#[must_use]
pub fn local_config(paths: Vec<String>) -> ReaderConfig {
    ReaderConfig::new(
        Protocol::Sftp,
        "localhost",
        SAMPLE_USERNAME,
        SAMPLE_PASSWORD,
        paths,
    )
}

/// Like [`local_config`] but for the stateless `ftp` transport shape.
#[must_use]
pub fn local_ftp_config(paths: Vec<String>) -> ReaderConfig {
    ReaderConfig::new(
        Protocol::Ftp,
        "localhost",
        SAMPLE_USERNAME,
        SAMPLE_PASSWORD,
        paths,
    )
}

/// `n` single-column rows, `0..n`.
#[must_use]
pub fn numbered_lines(n: usize) -> String {
    (0..n).map(|i| format!("{i}\n")).collect()
}
