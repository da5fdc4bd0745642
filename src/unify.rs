//! Coordinate unification: patch-normalized boxes → tile pixels → map units.
//!
//! For a detection in patch `(row, col)` with stride `S` and patch size `P`:
//!
//! ```text
//! global_px = cx · P + col · S
//! global_py = cy · P + row · S
//! ```
//!
//! Width and height scale by the same `P`. The pixel box corners are then
//! pushed through the tile's affine transform, which yields the geographic
//! centre, the footprint polygon and its envelope. Unification is a pure
//! function of `(tile, patch, detection)`; batches run in parallel when the
//! `parallel` feature is enabled.

use crate::diagnostics::RejectedDetection;
use crate::error::{ReconcileError, Result};
use crate::geometry::{GeoEnvelope, PixelBox};
use crate::tiling::TileGeometry;
use crate::types::{DetectionId, GlobalDetection, PatchDetections, RawDetection};
use log::warn;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Unified detections of one tile plus the records dropped on the way.
#[derive(Debug, Default)]
pub struct UnifyOutput {
    /// Sorted by [`DetectionId`].
    pub detections: Vec<GlobalDetection>,
    pub rejected: Vec<RejectedDetection>,
}

/// Lifts one validated raw detection into tile and map coordinates.
pub fn unify_detection(
    tile: &TileGeometry,
    id: DetectionId,
    raw: &RawDetection,
) -> Result<GlobalDetection> {
    let malformed = |reason: String| ReconcileError::MalformedDetection {
        patch: id.patch.clone(),
        index: id.index,
        reason,
    };

    if id.patch.tile_id != *tile.tile_id() {
        return Err(malformed(format!(
            "patch belongs to tile {}, not {}",
            id.patch.tile_id,
            tile.tile_id()
        )));
    }
    raw.validate().map_err(&malformed)?;
    let grid = tile.grid();
    if !grid.contains(id.patch.row, id.patch.col) {
        return Err(malformed(format!(
            "patch ({}, {}) outside the {}x{} patch grid",
            id.patch.row,
            id.patch.col,
            grid.rows(),
            grid.cols()
        )));
    }

    let size = grid.patch_size() as f64;
    let (ox, oy) = grid.patch_offset(id.patch.row, id.patch.col);
    let pixel = PixelBox {
        cx: raw.bbox.cx as f64 * size + ox as f64,
        cy: raw.bbox.cy as f64 * size + oy as f64,
        w: raw.bbox.w as f64 * size,
        h: raw.bbox.h as f64 * size,
    };
    if pixel.cx > tile.width() as f64 || pixel.cy > tile.height() as f64 {
        return Err(malformed(format!(
            "centre ({:.1}, {:.1}) lies beyond the {}x{} tile",
            pixel.cx,
            pixel.cy,
            tile.width(),
            tile.height()
        )));
    }

    let footprint = tile.transform().apply_points(&pixel.corners());
    Ok(GlobalDetection {
        id,
        class_id: raw.class_id,
        confidence: raw.confidence,
        pixel,
        geo_center: tile.pixel_to_geo(pixel.cx, pixel.cy),
        footprint,
        envelope: GeoEnvelope::from_quad(&footprint),
    })
}

/// Unifies every detection of a tile. Malformed detections are dropped with
/// a warning; the rest of their patch is still processed.
pub fn unify_tile(tile: &TileGeometry, patches: &[PatchDetections]) -> UnifyOutput {
    let jobs: Vec<(DetectionId, &RawDetection)> = patches
        .iter()
        .flat_map(|p| {
            p.detections.iter().enumerate().map(move |(index, raw)| {
                (
                    DetectionId {
                        patch: p.patch.clone(),
                        index: index as u32,
                    },
                    raw,
                )
            })
        })
        .collect();

    #[cfg(feature = "parallel")]
    let results: Vec<Result<GlobalDetection>> = jobs
        .into_par_iter()
        .map(|(id, raw)| unify_detection(tile, id, raw))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<GlobalDetection>> = jobs
        .into_iter()
        .map(|(id, raw)| unify_detection(tile, id, raw))
        .collect();

    let mut out = UnifyOutput::default();
    for result in results {
        match result {
            Ok(det) => out.detections.push(det),
            Err(err) => {
                warn!("dropping detection: {err}");
                if let ReconcileError::MalformedDetection {
                    patch,
                    index,
                    reason,
                } = err
                {
                    out.rejected.push(RejectedDetection {
                        id: DetectionId { patch, index },
                        reason,
                    });
                }
            }
        }
    }
    out.detections.sort_by(|a, b| a.id.cmp(&b.id));
    out.rejected.sort_by(|a, b| a.id.cmp(&b.id));
    out
}
