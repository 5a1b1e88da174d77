//! Chart archive reading and writing
//!
//! Chart packages are `.tgz` files whose entries live under a single
//! top-level directory named after the chart (`nginx/Chart.yaml`, ...).
//! Reading strips that directory so callers see chart-relative paths.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tar::{Archive, Builder, Header};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Whether a path names a gzip'd tar archive
pub fn is_archive(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(".tgz") || name.ends_with(".tar.gz")
}

/// Read every regular file of an archive in a single pass
///
/// Keys are `/`-separated paths relative to the top-level directory.
pub fn read_archive(archive_path: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let file = File::open(archive_path).map_err(|e| CoreError::Archive {
        message: format!("{}: {}", archive_path.display(), e),
    })?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);
    let mut contents = BTreeMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path()?.to_string_lossy().replace('\\', "/");
        let Some(rel) = strip_top_level(&path) else {
            continue;
        };
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        contents.insert(rel.to_string(), data);
    }

    if contents.is_empty() {
        return Err(CoreError::Archive {
            message: format!("{} contains no files", archive_path.display()),
        });
    }
    Ok(contents)
}

fn strip_top_level(path: &str) -> Option<&str> {
    let path = path.trim_start_matches("./");
    path.split_once('/')
        .map(|(_, rest)| rest)
        .filter(|rest| !rest.is_empty())
}

/// Package a directory as `<top_level>/<relative path>` entries
///
/// Entries are added in sorted order with a zero mtime so the archive bytes,
/// and therefore the lock file digest, are reproducible.
pub fn create_archive(dir: &Path, top_level: &str, output: &Path) -> Result<()> {
    let file = File::create(output)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CoreError::Archive {
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let content = std::fs::read(entry.path())?;
        add_bytes_to_archive(&mut builder, &format!("{}/{}", top_level, rel), &content)?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;
    Ok(())
}

/// Add bytes to a tar archive with a given path
fn add_bytes_to_archive<W: Write>(builder: &mut Builder<W>, archive_path: &str, content: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;

    Ok(())
}
