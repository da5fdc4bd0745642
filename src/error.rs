use crate::types::{PatchKey, TileId};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure taxonomy shared by every stage of the reconciliation pipeline.
///
/// `Configuration` is fatal for a run. `Georeferencing` and `EmptyResult` are
/// scoped to one tile, and `MalformedDetection`/`LabelParse` to one record.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("tile {tile_id}: georeferencing error: {reason}")]
    Georeferencing { tile_id: TileId, reason: String },

    #[error("patch {patch} detection #{index}: malformed detection: {reason}")]
    MalformedDetection {
        patch: PatchKey,
        index: u32,
        reason: String,
    },

    #[error("tile {tile_id}: no detections survived reconciliation")]
    EmptyResult { tile_id: TileId },

    #[error("CRS mismatch: layer is {expected}, features are {found}")]
    CrsMismatch { expected: String, found: String },

    #[error("{}:{line}: {reason}", path.display())]
    LabelParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("failed to {action} {}: {source}", path.display())]
    File {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    JsonFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReconcileError {
    pub fn georeferencing(tile_id: &TileId, reason: impl Into<String>) -> Self {
        Self::Georeferencing {
            tile_id: tile_id.clone(),
            reason: reason.into(),
        }
    }

    /// File-system failure tagged with the path it concerns.
    pub fn file(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::File {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// `true` for the non-exceptional "ran fine, nothing found" status.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::EmptyResult { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
