//! On-disk helpers shared by the adapters.
//!
//! Every object is one pretty-printed JSON file in a flat directory. Writes
//! go to a temporary sibling first and are renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PoolObjError, Result};

/// Extension of definition and state files.
pub const JSON_EXT: &str = "json";

/// `<dir>/<name>.<ext>`
pub fn build_path(dir: &Path, name: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, ext))
}

/// Files directly under `dir` with extension `ext`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn list_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PoolObjError::io(dir, e))? {
        let path = entry.map_err(|e| PoolObjError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File stem as UTF-8, if there is one.
pub fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

/// Mode of ordinary definition and state files.
pub const PUBLIC_MODE: u32 = 0o644;

/// Mode of files holding secrets.
pub const PRIVATE_MODE: u32 = 0o600;

/// `<path>.new`, the sibling a write goes to before the rename.
fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".new");
    PathBuf::from(tmp)
}

#[cfg(unix)]
fn create_new(path: &Path, mode: u32) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    // umask can only narrow `mode`
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn create_new(path: &Path, _mode: u32) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}

/// Write `bytes` to `path` with permission bits `mode`, creating parent
/// directories as needed.
///
/// The temporary sibling is created with `mode` already applied and is
/// removed again if anything fails before the rename lands.
pub fn write_file(path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PoolObjError::io(parent, e))?;
    }

    let tmp = temp_path(path);
    // a leftover from an interrupted write would keep its old mode
    remove_file(&tmp)?;

    let written = create_new(&tmp, mode)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .map_err(|e| PoolObjError::io(&tmp, e))
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| PoolObjError::io(path, e)));

    if let Err(e) = written {
        if let Err(cleanup) = remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temporary file");
        }
        return Err(e);
    }

    debug!(path = %path.display(), bytes = bytes.len(), mode = %format!("{:o}", mode), "Wrote file");
    Ok(())
}

/// Serialize `value` as JSON into `path` with permission bits `mode`.
pub fn write_json<T: Serialize>(path: &Path, value: &T, mode: u32) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_file(path, json.as_bytes(), mode)
}

/// Deserialize the JSON file at `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).map_err(|e| PoolObjError::io(path, e))?;
    serde_json::from_str(&json).map_err(|e| {
        PoolObjError::Serialization(format!("{}: {}", path.display(), e))
    })
}

/// Remove `path`; an already missing file is not an error.
pub fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PoolObjError::io(path, e)),
    }
}

/// Whether `link` resolves to the same file as `target`.
pub fn link_points_to(link: &Path, target: &Path) -> bool {
    match (fs::canonicalize(link), fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Create the symlink `link` pointing at `target`.
#[cfg(unix)]
pub fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
pub fn symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "autostart links require symlink support",
    ))
}
