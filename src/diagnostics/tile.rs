use crate::cluster::MatchRule;
use crate::diagnostics::TimingBreakdown;
use crate::tiling::PatchGrid;
use crate::types::{DetectionId, TileId};
use serde::Serialize;

/// A raw detection dropped at the boundary, with the reason.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedDetection {
    pub id: DetectionId,
    pub reason: String,
}

/// A qualifying duplicate pair, recorded for audit.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePair {
    pub a: DetectionId,
    pub b: DetectionId,
    pub distance_px: f64,
    pub iou: f64,
    pub rule: MatchRule,
}

/// A resolved detection removed by global NMS.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suppression {
    pub id: DetectionId,
    pub confidence: f32,
    pub suppressed_by: DetectionId,
    pub iou: f64,
}

/// Counters and audit records for one tile.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileDiagnostics {
    pub tile_id: TileId,
    pub crs: String,
    pub resolution_m: f64,
    /// Ground meaning of the pixel distance threshold at this tile's resolution.
    pub distance_threshold_m: f64,
    pub grid: PatchGrid,
    pub patches_in: usize,
    pub raw_detections: usize,
    pub malformed: Vec<RejectedDetection>,
    pub unified: usize,
    pub comparisons: usize,
    pub clusters: usize,
    pub duplicate_pairs: Vec<DuplicatePair>,
    pub duplicates_removed: usize,
    pub global_nms_removed: usize,
    pub suppressed: Vec<Suppression>,
    pub cross_tile_removed: usize,
    pub resolved: usize,
    pub timings: TimingBreakdown,
}
