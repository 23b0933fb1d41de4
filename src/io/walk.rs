//! Depth-first enumeration of the files selected by a [`PathSpec`].
//!
//! The walk starts at the specification's static prefix and never leaves it.
//! Directories are always descended into (the pattern is only tested against
//! files), and a directory whose contents cannot be listed is an error rather
//! than a gap in the result. Symlinks are followed; a link back to one of its
//! own ancestors is skipped instead of looping.
//!
//! Paths keep the form the user wrote, without canonicalizing, so a relative
//! specification yields relative paths and the matcher sees the same spelling
//! the pattern was written in.

use crate::error::{SourceError, SourceResult};
use crate::io::pattern::PathSpec;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Add every regular file selected by `spec` to `found`.
///
/// # Errors
///
/// - [`SourceError::DirectoryNotFound`] if the traversal root does not exist
/// - [`SourceError::PermissionDenied`] if the root or any directory below it
///   cannot be listed
/// - [`SourceError::Io`] for any other filesystem failure
pub fn enumerate(spec: &PathSpec, found: &mut BTreeSet<String>) -> SourceResult<()> {
    let root = spec.static_prefix();
    let walker = WalkDir::new(fs_path(root))
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => match walk_error(root, err) {
                Some(fatal) => return Err(fatal),
                None => continue,
            },
        };
        let Some(path) = spelled(root, entry.path()) else {
            warn!(path = ?entry.path(), "skipping entry with a non UTF-8 name");
            continue;
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            debug!(path, "ignoring special file");
        } else if spec.matches(path) {
            info!(path, "adding file as a candidate to be read");
            found.insert(path.to_string());
        }
    }
    Ok(())
}

/// Classify a walk failure: `None` skips the entry, `Some` aborts resolution.
fn walk_error(root: &str, err: walkdir::Error) -> Option<SourceError> {
    let at_root = err.depth() == 0;
    let path = match err.path() {
        Some(path) if !at_root => match spelled(root, path) {
            Some(spelled) => display_root(spelled),
            None => path.display().to_string(),
        },
        _ => display_root(root),
    };

    if let Some(ancestor) = err.loop_ancestor() {
        warn!(path = %path, ancestor = ?ancestor, "skipping symlink that loops back to an ancestor");
        return None;
    }
    let kind = err.io_error().map(std::io::Error::kind);
    match kind {
        Some(ErrorKind::NotFound) if at_root => {
            error!(path = %path, "configured directory does not exist");
            Some(SourceError::DirectoryNotFound { path })
        }
        Some(ErrorKind::NotFound) => {
            // dangling symlink, or removed since the parent was listed
            warn!(path = %path, "skipping entry that no longer resolves");
            None
        }
        Some(ErrorKind::PermissionDenied) => {
            error!(path = %path, "no permission to list directory");
            Some(SourceError::PermissionDenied { path })
        }
        _ => {
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            error!(path = %path, error = %source, "cannot walk directory");
            Some(SourceError::Io { path, source })
        }
    }
}

/// `path` in the user's spelling: walking `""` happens under `.`, whose `./`
/// prefix is not part of what the user wrote.
fn spelled<'a>(root: &str, path: &'a Path) -> Option<&'a str> {
    let path = path.to_str()?;
    if root.is_empty() {
        Some(path.strip_prefix("./").unwrap_or(path))
    } else {
        Some(path)
    }
}

fn fs_path(path: &str) -> &Path {
    if path.is_empty() { Path::new(".") } else { Path::new(path) }
}

/// `path` as shown in errors: no trailing slash, `.` for the working directory.
fn display_root(path: &str) -> String {
    match path.trim_end_matches('/') {
        "" if path.is_empty() => ".".to_string(),
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spelling_drops_the_implicit_working_directory() {
        assert_eq!(spelled("", Path::new("./a/b.csv")), Some("a/b.csv"));
        assert_eq!(spelled("./", Path::new("./a.csv")), Some("./a.csv"));
        assert_eq!(spelled("/d/", Path::new("/d/a")), Some("/d/a"));
    }

    #[test]
    fn error_paths_drop_trailing_slash() {
        assert_eq!(display_root(""), ".");
        assert_eq!(display_root("/"), "/");
        assert_eq!(display_root("/data/logs/"), "/data/logs");
    }
}
