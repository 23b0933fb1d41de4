//! Temporary directory trees for resolution and read tests.

use crate::io::compression::auto_detect_writer;
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory deleted on drop. Paths are handed out as `String`s,
/// the form the resolver works with.
#[derive(Debug)]
pub struct SourceTree {
    dir: TempDir,
    root: String,
}

impl SourceTree {
    /// Create an empty tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or its path is not
    /// valid UTF-8.
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        let root = dir
            .path()
            .to_str()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "temp dir is not UTF-8"))?
            .trim_end_matches('/')
            .to_string();
        Ok(Self { dir, root })
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Absolute form of `rel`; nothing is created.
    #[must_use]
    pub fn path(&self, rel: &str) -> String {
        format!("{}/{}", self.root, rel.trim_start_matches('/'))
    }

    /// Write `contents` at `rel`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn file(&self, rel: &str, contents: impl AsRef<[u8]>) -> io::Result<String> {
        let path = self.path(rel);
        create_parent(Path::new(&path))?;
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Create the directory `rel` and its parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn dir(&self, rel: &str) -> io::Result<String> {
        let path = self.path(rel);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Write `contents` at `rel`, compressed with the codec its extension names.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or compressed.
    pub fn compressed_file(&self, rel: &str, contents: impl AsRef<[u8]>) -> Result<String> {
        let path = self.path(rel);
        create_parent(Path::new(&path))?;
        let file = fs::File::create(&path).with_context(|| format!("create {path}"))?;
        let mut writer = auto_detect_writer(file, &path)?;
        writer
            .write_all(contents.as_ref())
            .with_context(|| format!("write {path}"))?;
        writer.flush().with_context(|| format!("flush {path}"))?;
        drop(writer);
        Ok(path)
    }

    /// Remove all permissions from `rel` until the guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the permissions cannot be read or changed.
    #[cfg(unix)]
    pub fn deny(&self, rel: &str) -> io::Result<PermissionGuard> {
        use std::os::unix::fs::PermissionsExt;

        let path = PathBuf::from(self.path(rel));
        let mode = fs::metadata(&path)?.permissions().mode();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000))?;
        Ok(PermissionGuard { path, mode })
    }

    /// The underlying directory.
    #[must_use]
    pub fn dir_path(&self) -> &Path {
        self.dir.path()
    }
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Restores a path's permissions on drop so the tree can be cleaned up.
#[cfg(unix)]
#[derive(Debug)]
pub struct PermissionGuard {
    path: PathBuf,
    mode: u32,
}

#[cfg(unix)]
impl Drop for PermissionGuard {
    fn drop(&mut self) {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(self.mode));
    }
}

/// Whether the current user is subject to file permissions. Root is not,
/// so permission-denied tests skip themselves there.
#[cfg(unix)]
#[must_use]
pub fn permissions_enforced() -> bool {
    use std::os::unix::fs::PermissionsExt;

    let Ok(dir) = TempDir::new() else {
        return false;
    };
    let locked = dir.path().join("locked");
    if fs::create_dir(&locked).is_err()
        || fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).is_err()
    {
        return false;
    }
    let enforced = fs::read_dir(&locked).is_err();
    let _ = fs::set_permissions(&locked, fs::Permissions::from_mode(0o755));
    enforced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_land_under_the_root() {
        let tree = SourceTree::new().unwrap();
        let path = tree.file("/a/b/c.txt", "x").unwrap();
        assert!(path.starts_with(tree.root()));
        assert!(path.ends_with("/a/b/c.txt"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "x");
        assert!(tree.dir_path().join("a/b").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn deny_guard_restores_access() {
        let tree = SourceTree::new().unwrap();
        let dir = tree.dir("locked").unwrap();
        {
            let _guard = tree.deny("locked").unwrap();
        }
        assert!(fs::read_dir(dir).is_ok());
    }
}
