//! Per-tile pipeline: geometry → unify → cluster → resolve → global NMS.
//!
//! Typical usage:
//! ```no_run
//! use patch_reconcile::reconciler::{ReconcileParams, TileInput, TileProcessor};
//!
//! # fn example(input: TileInput) -> patch_reconcile::Result<()> {
//! let processor = TileProcessor::new(ReconcileParams::default())?;
//! let report = processor.process(&input)?;
//! println!("{} rocks, {} duplicates removed",
//!     report.resolved.len(), report.diagnostics.duplicates_removed);
//! # Ok(())
//! # }
//! ```
use super::options::ReconcileParams;
use super::TileReport;
use super::TileInput;
use crate::cluster::{cluster_detections, MatchCriteria};
use crate::diagnostics::{TileDiagnostics, TimingBreakdown};
use crate::error::Result;
use crate::resolve::{global_nms, resolve_clusters};
use crate::tiling::TileGeometry;
use crate::unify::unify_tile;
use log::debug;
use std::time::Instant;

/// Reconciles the detections of single tiles under fixed parameters.
///
/// Stateless between calls; one processor can be shared across threads.
#[derive(Clone, Debug)]
pub struct TileProcessor {
    params: ReconcileParams,
    criteria: MatchCriteria,
}

impl TileProcessor {
    /// Validates the parameters up front; invalid ones are a configuration error.
    pub fn new(params: ReconcileParams) -> Result<Self> {
        params.validate()?;
        let criteria = MatchCriteria::from_params(&params);
        Ok(Self { params, criteria })
    }

    pub fn params(&self) -> &ReconcileParams {
        &self.params
    }

    /// Runs the full per-tile pipeline.
    ///
    /// Fails only when the tile cannot be georeferenced. A tile whose
    /// detections are all malformed or absent returns an empty report.
    pub fn process(&self, input: &TileInput) -> Result<TileReport> {
        let total_start = Instant::now();
        let mut timings = TimingBreakdown::default();
        debug!(
            "TileProcessor::process start tile={} {}x{} patches={}",
            input.meta.tile_id,
            input.meta.width,
            input.meta.height,
            input.patches.len()
        );

        let tile = timings.measure("geometry", || TileGeometry::new(&input.meta, &self.params))?;

        let raw_detections: usize = input.patches.iter().map(|p| p.detections.len()).sum();
        let unified = timings.measure("unify", || unify_tile(&tile, &input.patches));
        debug!(
            "tile {}: unified {} of {} detections",
            tile.tile_id(),
            unified.detections.len(),
            raw_detections
        );

        let clustered = timings.measure("cluster", || {
            cluster_detections(&unified.detections, tile.grid(), &self.criteria)
        });
        let resolved = timings.measure("resolve", || {
            resolve_clusters(&unified.detections, &clustered.clusters)
        });
        let duplicates_removed = unified.detections.len() - resolved.len();

        let nms = timings.measure("global_nms", || {
            global_nms(resolved, self.params.global_nms_iou)
        });
        timings.total_ms = total_start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            "tile {}: {} clusters, {} duplicates, {} NMS removals, {} resolved ({:.2} ms)",
            tile.tile_id(),
            clustered.clusters.len(),
            duplicates_removed,
            nms.suppressed.len(),
            nms.kept.len(),
            timings.total_ms
        );

        let diagnostics = TileDiagnostics {
            tile_id: tile.tile_id().clone(),
            crs: tile.crs().to_string(),
            resolution_m: tile.resolution_m(),
            distance_threshold_m: self.params.distance_threshold_m(tile.resolution_m()),
            grid: *tile.grid(),
            patches_in: input.patches.len(),
            raw_detections,
            malformed: unified.rejected,
            unified: unified.detections.len(),
            comparisons: clustered.comparisons,
            clusters: clustered.clusters.len(),
            duplicate_pairs: clustered.pairs,
            duplicates_removed,
            global_nms_removed: nms.suppressed.len(),
            suppressed: nms.suppressed,
            cross_tile_removed: 0,
            resolved: nms.kept.len(),
            timings,
        };

        Ok(TileReport {
            envelope: tile.envelope(),
            geometry: tile,
            resolved: nms.kept,
            diagnostics,
        })
    }
}
