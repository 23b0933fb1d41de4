//! Test helpers for code that reads file sources.
//!
//! - [`SourceTree`]: a temporary directory tree to resolve and read from
//! - [`fixtures`]: sample file contents and ready-made configurations
//! - [`FakeTransport`](crate::transport::FakeTransport): in-memory transport with
//!   failure injection
//!
//! # Example
//!
//! ```
//! use ironferry::io::sources::build_source_list;
//! use ironferry::testing::SourceTree;
//!
//! # fn main() -> anyhow::Result<()> {
//! let tree = SourceTree::new()?;
//! tree.file("in/a.csv", "1,2\n")?;
//! tree.file("in/b.txt", "x\n")?;
//!
//! let found = build_source_list(&[tree.path("in/*.csv")])?;
//! assert_eq!(found, vec![tree.path("in/a.csv")]);
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
mod source_tree;

pub use fixtures::*;
pub use source_tree::SourceTree;

#[cfg(unix)]
pub use source_tree::{PermissionGuard, permissions_enforced};
