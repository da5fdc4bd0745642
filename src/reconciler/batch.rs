use super::cross_tile::run_cross_tile;
use super::options::ReconcileParams;
use super::pipeline::TileProcessor;
use super::{TileInput, TileOutcome};
use crate::diagnostics::{BatchSummary, CrossTileStage, FailedTile};
use crate::emit::{layers_by_crs, VectorLayer};
use crate::error::Result;
use crate::tiling::TileMeta;
use crate::types::{PatchDetections, TileId};
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Outcome of a whole batch: one entry per input tile, ordered by tile id.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub summary: BatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_tile: Option<CrossTileStage>,
    pub outcomes: Vec<TileOutcome>,
}

impl BatchReport {
    /// One output layer per distinct CRS among the resolved tiles.
    pub fn layers(&self, name: &str) -> Vec<VectorLayer> {
        layers_by_crs(
            name,
            self.outcomes
                .iter()
                .filter_map(TileOutcome::report)
                .map(|r| (r.crs(), r.resolved.as_slice())),
        )
    }

    pub fn failed(&self) -> &[FailedTile] {
        &self.summary.failed
    }

    /// Adds tiles that failed before processing, e.g. labels without metadata.
    pub fn with_failed(mut self, failed: Vec<FailedTile>) -> Self {
        if failed.is_empty() {
            return self;
        }
        self.outcomes
            .extend(failed.into_iter().map(TileOutcome::Failed));
        self.outcomes.sort_by(|a, b| a.tile_id().cmp(b.tile_id()));
        self.summary = BatchSummary::from_outcomes(&self.outcomes);
        self
    }
}

/// Reconciles every tile of a batch.
///
/// Invalid parameters abort the batch with a configuration error. Anything
/// that goes wrong with a single tile only fails that tile.
pub fn process_batch(tiles: Vec<TileInput>, params: &ReconcileParams) -> Result<BatchReport> {
    let processor = TileProcessor::new(params.clone())?;

    let mut counts: BTreeMap<&TileId, usize> = BTreeMap::new();
    for tile in &tiles {
        *counts.entry(tile.tile_id()).or_default() += 1;
    }
    let duplicated: BTreeSet<TileId> = counts
        .into_iter()
        .filter(|&(_, n)| n > 1)
        .map(|(id, _)| id.clone())
        .collect();

    let run = |input: &TileInput| -> TileOutcome {
        if duplicated.contains(input.tile_id()) {
            return TileOutcome::Failed(FailedTile {
                tile_id: input.tile_id().clone(),
                reason: "tile id occurs more than once in the batch".to_string(),
            });
        }
        let outcome = TileOutcome::from_result(input.tile_id(), processor.process(input));
        if let TileOutcome::Failed(failed) = &outcome {
            warn!("tile {} failed: {}", failed.tile_id, failed.reason);
        }
        outcome
    };

    #[cfg(feature = "parallel")]
    let mut outcomes: Vec<TileOutcome> = tiles.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let mut outcomes: Vec<TileOutcome> = tiles.iter().map(run).collect();

    outcomes.sort_by(|a, b| a.tile_id().cmp(b.tile_id()));

    let (outcomes, cross_tile) = match &params.cross_tile {
        Some(cross) => {
            let (outcomes, stage) = run_cross_tile(outcomes, cross, params);
            (outcomes, Some(stage))
        }
        None => (outcomes, None),
    };

    let summary = BatchSummary::from_outcomes(&outcomes);
    info!(
        "batch: {} tiles ({} resolved, {} empty, {} failed); {} raw detections -> {} resolved ({} duplicates, {} NMS, {} cross-tile)",
        summary.tiles_total,
        summary.tiles_resolved,
        summary.tiles_empty,
        summary.tiles_failed,
        summary.raw_detections,
        summary.resolved,
        summary.duplicates_removed,
        summary.global_nms_removed,
        summary.cross_tile_removed
    );

    Ok(BatchReport {
        summary,
        cross_tile,
        outcomes,
    })
}

/// Pairs tile metadata with the patch detections loaded for it.
///
/// Tiles without labels get an empty patch list. Labels of tiles without
/// metadata cannot be georeferenced and are reported as failed tiles.
pub fn assemble_inputs(
    metas: Vec<TileMeta>,
    mut labels: BTreeMap<TileId, Vec<PatchDetections>>,
) -> (Vec<TileInput>, Vec<FailedTile>) {
    let inputs: Vec<TileInput> = metas
        .into_iter()
        .map(|meta| {
            let patches = labels.remove(&meta.tile_id).unwrap_or_default();
            TileInput::new(meta, patches)
        })
        .collect();
    let orphans = labels
        .into_keys()
        .map(|tile_id| {
            warn!("labels for tile {tile_id} have no tile metadata");
            FailedTile {
                tile_id,
                reason: "no raster metadata for labelled tile".to_string(),
            }
        })
        .collect();
    (inputs, orphans)
}
