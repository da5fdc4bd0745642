//! Tile reconciliation orchestrating the patch-detection pipeline.
//!
//! Overview
//! - Validates the tile's raster metadata into a [`TileGeometry`] (patch grid
//!   plus affine transform) and fails the tile, not the batch, when it cannot
//!   be georeferenced.
//! - Lifts every raw patch detection into tile pixels and map coordinates,
//!   dropping malformed records with a warning.
//! - Clusters duplicates across neighbouring patches (union-find), keeps the
//!   most confident member of each cluster and optionally runs a global
//!   greedy NMS pass over the survivors.
//! - At batch level, tiles run independently (in parallel with the
//!   `parallel` feature). An optional second round compares detections near
//!   the edges of touching tiles.
//!
//! Modules
//! - [`options`] – run parameters and their validation.
//! - `pipeline` – the per-tile [`TileProcessor`].
//! - `batch` – [`process_batch`] and the [`BatchReport`].
//! - `cross_tile` – the staged cross-tile round.
//!
//! Every stage returns a new value. The cross-tile round runs after all
//! tiles are resolved and replaces the reports it touches with rebuilt ones.

mod batch;
mod cross_tile;
pub mod options;
mod pipeline;

pub use batch::{assemble_inputs, process_batch, BatchReport};
pub use options::{CrossTileParams, ReconcileParams};
pub use pipeline::TileProcessor;

use crate::diagnostics::{FailedTile, TileDiagnostics};
use crate::emit::{emit_tile, VectorLayer};
use crate::error::Result;
use crate::geometry::GeoEnvelope;
use crate::tiling::{TileGeometry, TileMeta};
use crate::types::{PatchDetections, ResolvedDetection, TileId};
use serde::Serialize;

/// Everything the pipeline needs for one tile.
#[derive(Clone, Debug)]
pub struct TileInput {
    pub meta: TileMeta,
    pub patches: Vec<PatchDetections>,
}

impl TileInput {
    pub fn new(meta: TileMeta, patches: Vec<PatchDetections>) -> Self {
        Self { meta, patches }
    }

    pub fn tile_id(&self) -> &TileId {
        &self.meta.tile_id
    }
}

/// Result of reconciling one tile.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileReport {
    #[serde(skip)]
    pub geometry: TileGeometry,
    pub envelope: GeoEnvelope,
    /// Sorted by detection id.
    pub resolved: Vec<ResolvedDetection>,
    pub diagnostics: TileDiagnostics,
}

impl TileReport {
    pub fn tile_id(&self) -> &TileId {
        self.geometry.tile_id()
    }

    pub fn crs(&self) -> &str {
        self.geometry.crs()
    }

    /// Output layer of this tile; `EmptyResult` when nothing survived.
    pub fn to_layer(&self) -> Result<VectorLayer> {
        emit_tile(self.tile_id(), self.crs(), &self.resolved)
    }
}

/// Per-tile outcome collected by the batch driver.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TileOutcome {
    Resolved(TileReport),
    /// Processed fine, nothing survived.
    Empty(TileReport),
    Failed(FailedTile),
}

impl TileOutcome {
    pub fn from_result(tile_id: &TileId, result: Result<TileReport>) -> Self {
        match result {
            Ok(report) => Self::from_report(report),
            Err(err) => Self::Failed(FailedTile {
                tile_id: tile_id.clone(),
                reason: err.to_string(),
            }),
        }
    }

    pub fn from_report(report: TileReport) -> Self {
        if report.resolved.is_empty() {
            Self::Empty(report)
        } else {
            Self::Resolved(report)
        }
    }

    pub fn tile_id(&self) -> &TileId {
        match self {
            Self::Resolved(report) | Self::Empty(report) => report.tile_id(),
            Self::Failed(failed) => &failed.tile_id,
        }
    }

    pub fn report(&self) -> Option<&TileReport> {
        match self {
            Self::Resolved(report) | Self::Empty(report) => Some(report),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
