//! Staging root
//!
//! Every generation renders into a fresh temporary directory that mirrors
//! the workspace root. The directory is removed when the [`Staging`] value
//! is dropped, whether or not it was promoted.

use simple_ops_core::config::DEPLOY_DIR;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{EngineError, Result};

pub const STAGING_PREFIX: &str = "simple-ops-";

/// A private, temporary mirror of the workspace root
#[derive(Debug)]
pub struct Staging {
    dir: tempfile::TempDir,
}

impl Staging {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir()?;
        fs::create_dir_all(dir.path().join(DEPLOY_DIR))?;
        tracing::debug!(path = %dir.path().display(), "created staging root");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn deploy_dir(&self) -> PathBuf {
        self.dir.path().join(DEPLOY_DIR)
    }

    /// Replace the live `deploy/` tree under `root` with the staged one
    ///
    /// The old tree is removed first, then the staged tree is renamed into
    /// place (copied when a rename is not possible, e.g. across
    /// filesystems). Other staged top-level entries, such as files written
    /// to explicit `with` paths, are copied over the workspace.
    pub fn promote(self, root: &Path) -> Result<()> {
        let live = root.join(DEPLOY_DIR);
        if live.exists() {
            fs::remove_dir_all(&live)?;
        }

        let staged = self.deploy_dir();
        if let Err(e) = fs::rename(&staged, &live) {
            tracing::debug!(error = %e, "rename failed, copying staged tree");
            copy_tree(&staged, &live, true)?;
        }

        for entry in fs::read_dir(self.path())? {
            let entry = entry?;
            let name = entry.file_name();
            if name == DEPLOY_DIR || entry.file_type()?.is_symlink() {
                continue;
            }
            copy_tree(&entry.path(), &root.join(&name), true)?;
        }

        tracing::debug!(root = %root.display(), "promoted staging root");
        Ok(())
    }
}

/// Copy a file or directory tree
///
/// Symlinks are skipped. Without `overwrite`, files that already exist at
/// the destination are left alone.
pub fn copy_tree(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = if rel.as_os_str().is_empty() {
            dst.to_path_buf()
        } else {
            dst.join(rel)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            if !overwrite && target.exists() {
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Join a relative path onto `root`, refusing anything that leaves it
///
/// The check is lexical: `..` may only climb back out of directories the
/// path itself entered.
pub fn resolve_within(root: &Path, rel: &str) -> Result<PathBuf> {
    let escape = || EngineError::PathEscape { path: rel.to_string() };

    let mut normalized = PathBuf::new();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(escape());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(escape());
    }
    Ok(root.join(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_within() {
        let root = Path::new("/stage");

        assert_eq!(resolve_within(root, "a/b.yaml").unwrap(), root.join("a/b.yaml"));
        assert_eq!(resolve_within(root, "./a/../b.yaml").unwrap(), root.join("b.yaml"));
        assert!(matches!(resolve_within(root, "../b.yaml"), Err(EngineError::PathEscape { .. })));
        assert!(matches!(resolve_within(root, "a/../../b"), Err(EngineError::PathEscape { .. })));
        assert!(matches!(resolve_within(root, "/etc/passwd"), Err(EngineError::PathEscape { .. })));
        assert!(matches!(resolve_within(root, "."), Err(EngineError::PathEscape { .. })));
    }

    #[test]
    fn test_copy_tree_respects_overwrite() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("nested")).unwrap();
        fs::write(src.path().join("nested/a.yaml"), "new").unwrap();
        fs::write(src.path().join("b.yaml"), "new").unwrap();
        fs::write(dst.path().join("b.yaml"), "old").unwrap();

        copy_tree(src.path(), dst.path(), false).unwrap();
        assert_eq!(fs::read_to_string(dst.path().join("nested/a.yaml")).unwrap(), "new");
        assert_eq!(fs::read_to_string(dst.path().join("b.yaml")).unwrap(), "old");

        copy_tree(src.path(), dst.path(), true).unwrap();
        assert_eq!(fs::read_to_string(dst.path().join("b.yaml")).unwrap(), "new");
    }

    #[test]
    fn test_copy_single_file() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("k.yaml"), "x").unwrap();

        copy_tree(&src.path().join("k.yaml"), &dst.path().join("sub/k.yaml"), false).unwrap();
        assert_eq!(fs::read_to_string(dst.path().join("sub/k.yaml")).unwrap(), "x");
    }

    #[test]
    fn test_promote_replaces_deploy_tree() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("deploy/old")).unwrap();
        fs::write(root.path().join("deploy/old/manifest.yaml"), "old").unwrap();

        let staging = Staging::new().unwrap();
        let staged_path = staging.path().to_path_buf();
        fs::create_dir_all(staging.deploy_dir().join("dev/app")).unwrap();
        fs::write(staging.deploy_dir().join("dev/app/manifest.yaml"), "new").unwrap();
        fs::write(staging.path().join("extra.yaml"), "extra").unwrap();

        staging.promote(root.path()).unwrap();

        assert!(!root.path().join("deploy/old").exists());
        assert_eq!(
            fs::read_to_string(root.path().join("deploy/dev/app/manifest.yaml")).unwrap(),
            "new"
        );
        assert_eq!(fs::read_to_string(root.path().join("extra.yaml")).unwrap(), "extra");
        assert!(!staged_path.exists());
    }

    #[test]
    fn test_drop_removes_staging() {
        let staging = Staging::new().unwrap();
        let path = staging.path().to_path_buf();
        assert!(path.join("deploy").is_dir());

        drop(staging);
        assert!(!path.exists());
    }
}
