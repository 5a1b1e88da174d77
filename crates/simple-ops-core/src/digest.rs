//! Content digests over files and directory trees
//!
//! Directory walks are sorted by file name at every level, so two trees with
//! the same files and contents hash identically regardless of the order the
//! platform returns directory entries in.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::Result;

const BUF_SIZE: usize = 8192;

/// Compute the SHA-256 of in-memory data as lowercase hex
pub fn compute_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Stream one file through SHA-256
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    feed_file(&mut hasher, path)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Single combined SHA-256 over every regular file below `dir`
///
/// Only file contents are hashed, in sorted walk order. Directories are
/// skipped. A path that cannot be read mid-walk fails the whole digest.
pub fn sha256_dir(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        if entry.file_type().is_dir() {
            continue;
        }
        feed_file(&mut hasher, entry.path())?;
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Per-file digests below `dir`, keyed by `/`-separated relative path
pub fn file_digests(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut digests = BTreeMap::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        digests.insert(rel, sha256_file(entry.path())?);
    }
    Ok(digests)
}

fn feed_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut file = File::open(path).map_err(|e| with_path(path, e))?;
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| with_path(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

fn with_path(path: &Path, err: std::io::Error) -> std::io::Error {
    std::io::Error::new(err.kind(), format!("{}: {}", path.display(), err))
}

fn walk_error(err: walkdir::Error) -> std::io::Error {
    let path = err
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let message = format!("{}: {}", path, err);
    match err.into_io_error() {
        Some(io) => std::io::Error::new(io.kind(), message),
        None => std::io::Error::other(message),
    }
}
