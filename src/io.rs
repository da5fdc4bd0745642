//! File helpers shared by the binary and the emitters.
//!
//! - `read_json_file`: deserialize a JSON document from disk.
//! - `write_json_file`: pretty-print a serializable value to disk.
//!
//! Every failure names the file it concerns.
use crate::error::{ReconcileError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Read and deserialize a JSON file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| ReconcileError::file("read", path, e))?;
    serde_json::from_str(&text).map_err(|source| ReconcileError::JsonFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|source| ReconcileError::JsonFile {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|e| ReconcileError::file("write", path, e))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ReconcileError::file("create", parent, e))?;
        }
    }
    Ok(())
}
