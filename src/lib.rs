#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod config;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod labels;
pub mod reconciler;
pub mod tiling;
pub mod types;

// Stage building blocks – public for tools and tests, but considered
// internals of the reconciler.
pub mod cluster;
pub mod geometry;
pub mod io;
pub mod resolve;
pub mod unify;

// --- High-level re-exports -------------------------------------------------

// Main entry points: per-tile processor, batch driver and their reports.
pub use crate::reconciler::{
    process_batch, BatchReport, ReconcileParams, TileInput, TileOutcome, TileProcessor, TileReport,
};

pub use crate::error::{ReconcileError, Result};

// Vector output.
pub use crate::emit::{emit_tile, VectorLayer};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use patch_reconcile::prelude::*;
///
/// # fn main() -> patch_reconcile::Result<()> {
/// let meta = TileMeta {
///     tile_id: TileId::new("2587_1133"),
///     width: 2000,
///     height: 2000,
///     transform: Some([0.5, 0.0, 2_587_000.0, 0.0, -0.5, 1_134_000.0]),
///     crs: Some("EPSG:2056".into()),
///     resolution_m: None,
/// };
/// let patches = vec![PatchDetections {
///     patch: PatchKey::new(TileId::new("2587_1133"), 0, 0),
///     detections: vec![RawDetection::new(0, 0.5, 0.9, 0.02, 0.02, 0.87)],
/// }];
///
/// let report = process_batch(vec![TileInput::new(meta, patches)], &ReconcileParams::default())?;
/// println!("resolved={} failed={}", report.summary.resolved, report.summary.tiles_failed);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::tiling::TileMeta;
    pub use crate::types::{PatchDetections, PatchKey, RawDetection, TileId};
    pub use crate::{process_batch, ReconcileParams, TileInput, TileProcessor};
}

// --- Stage-level API (for tools & advanced users) --------------------------

pub mod stages {
    // Stage runners.
    pub use crate::cluster::{cluster_detections, ClusterOutput, MatchCriteria};
    pub use crate::resolve::{global_nms, resolve_clusters, NmsOutcome};
    pub use crate::unify::{unify_detection, unify_tile, UnifyOutput};

    // Structured diagnostics types.
    pub use crate::diagnostics::{
        BatchSummary, CrossTileRemoval, CrossTileStage, DuplicatePair, FailedTile,
        RejectedDetection, StageTiming, Suppression, TileDiagnostics, TimingBreakdown,
    };
}
