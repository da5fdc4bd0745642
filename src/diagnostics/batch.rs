use crate::reconciler::TileOutcome;
use crate::types::{DetectionId, TileId};
use serde::Serialize;

/// A tile that could not be processed, and why.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTile {
    pub tile_id: TileId,
    pub reason: String,
}

/// A detection dropped by the cross-tile round in favour of `kept`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossTileRemoval {
    pub id: DetectionId,
    pub confidence: f32,
    pub kept: DetectionId,
}

/// Report of the optional cross-tile clustering round.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossTileStage {
    pub band_px: f64,
    /// Pairs of tiles whose footprints touch.
    pub tile_pairs: usize,
    /// Resolved detections inside an edge band.
    pub candidates: usize,
    pub comparisons: usize,
    pub removed: Vec<CrossTileRemoval>,
    pub elapsed_ms: f64,
}

/// Batch-level totals; `failed` enumerates every tile that errored.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub tiles_total: usize,
    pub tiles_resolved: usize,
    pub tiles_empty: usize,
    pub tiles_failed: usize,
    pub raw_detections: usize,
    pub malformed: usize,
    pub clusters: usize,
    pub duplicates_removed: usize,
    pub global_nms_removed: usize,
    pub cross_tile_removed: usize,
    pub resolved: usize,
    pub failed: Vec<FailedTile>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[TileOutcome]) -> Self {
        let mut summary = Self {
            tiles_total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                TileOutcome::Failed(failed) => {
                    summary.tiles_failed += 1;
                    summary.failed.push(failed.clone());
                    continue;
                }
                TileOutcome::Resolved(_) => summary.tiles_resolved += 1,
                TileOutcome::Empty(_) => summary.tiles_empty += 1,
            }
            if let Some(report) = outcome.report() {
                let d = &report.diagnostics;
                summary.raw_detections += d.raw_detections;
                summary.malformed += d.malformed.len();
                summary.clusters += d.clusters;
                summary.duplicates_removed += d.duplicates_removed;
                summary.global_nms_removed += d.global_nms_removed;
                summary.cross_tile_removed += d.cross_tile_removed;
                summary.resolved += report.resolved.len();
            }
        }
        summary
    }
}
