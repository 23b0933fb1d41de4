//! Resolve the configured path specifications into the list of files to read.

use crate::error::{SourceError, SourceResult};
use crate::io::pattern::PathSpec;
use crate::io::walk::enumerate;
use std::collections::BTreeSet;
use tracing::info;

/// Resolve every specification and merge the results.
///
/// Overlapping specifications collapse to one entry per path. The result is
/// sorted; the order carries no meaning beyond being stable for an unchanged
/// filesystem.
///
/// # Errors
///
/// Fails on the first specification whose tree cannot be walked, or with
/// [`SourceError::EmptySource`] when nothing matched at all. An empty result is
/// always treated as a misconfiguration, never as "nothing to do".
pub fn build_source_list(paths: &[String]) -> SourceResult<Vec<String>> {
    let mut found = BTreeSet::new();
    for raw in paths {
        let spec = PathSpec::parse(raw);
        enumerate(&spec, &mut found)?;
    }

    if found.is_empty() {
        return Err(SourceError::EmptySource {
            paths: paths.to_vec(),
        });
    }
    info!(files = found.len(), "resolved source files to read");
    Ok(found.into_iter().collect())
}
