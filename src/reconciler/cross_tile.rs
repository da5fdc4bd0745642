//! Cross-tile round: duplicates straddling the border of two tiles.
//!
//! Runs after every tile is resolved on its own. Only resolved detections
//! whose centre lies within `band_px` of their tile edge take part, and they
//! are only compared across tiles in the same CRS whose envelopes touch.
//! Touching pairs come from an R-tree over the tile envelopes, so the cost
//! grows with the number of neighbouring tiles rather than with all pairs.
//! The distance rule is applied in map units, `distance_threshold_px` scaled
//! by the coarser of the two resolutions; the overlap rule is unchanged.
//! Matches are unioned and each group keeps its preferred member, exactly
//! as the in-tile resolver does. Tile reports are rebuilt, not edited.

use super::options::{CrossTileParams, ReconcileParams};
use super::{TileOutcome, TileReport};
use crate::cluster::{DisjointSet, MatchCriteria};
use crate::diagnostics::{CrossTileRemoval, CrossTileStage, TileDiagnostics};
use crate::resolve::preference;
use crate::tiling::{TileCatalog, TileGeometry};
use crate::types::{DiscardedMember, GlobalDetection, ResolvedDetection, TileId};
use log::debug;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

struct Candidate {
    tile: TileId,
    /// Index into that tile's resolved detections.
    slot: usize,
    center: [f64; 2],
    detection: GlobalDetection,
}

/// Tile envelope in the spatial index, grown by one pixel to absorb
/// rounding at shared edges.
struct TileBounds {
    slot: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for TileBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// What the round takes away from, and adds to, each tile.
#[derive(Default)]
struct TileEdits {
    removed: BTreeSet<usize>,
    /// Winner slot -> absorbed cluster size and discarded members.
    absorbed: BTreeMap<usize, (usize, Vec<DiscardedMember>)>,
}

pub(crate) fn run_cross_tile(
    outcomes: Vec<TileOutcome>,
    cross: &CrossTileParams,
    params: &ReconcileParams,
) -> (Vec<TileOutcome>, CrossTileStage) {
    let start = Instant::now();
    let criteria = MatchCriteria::from_params(params);
    let mut stage = CrossTileStage {
        band_px: cross.band_px,
        ..Default::default()
    };

    let mut catalog = TileCatalog::new();
    let mut reports: BTreeMap<TileId, &TileReport> = BTreeMap::new();
    for report in outcomes.iter().filter_map(TileOutcome::report) {
        if !report.resolved.is_empty() {
            catalog.insert(report.geometry.clone());
            reports.insert(report.tile_id().clone(), report);
        }
    }

    let tile_pairs = touching_tiles(&catalog);
    stage.tile_pairs = tile_pairs.len();
    let involved: BTreeSet<&TileId> = tile_pairs.iter().flat_map(|(a, b)| [*a, *b]).collect();

    let mut candidates: Vec<Candidate> = Vec::new();
    let mut by_tile: BTreeMap<&TileId, Vec<usize>> = BTreeMap::new();
    for &tile_id in &involved {
        let (Some(tile), Some(report)) = (catalog.get(tile_id), reports.get(tile_id)) else {
            continue;
        };
        for (slot, resolved) in report.resolved.iter().enumerate() {
            let det = &resolved.detection;
            if tile.edge_distance_px(det.pixel.cx, det.pixel.cy) >= cross.band_px {
                continue;
            }
            let Ok(center) = catalog.pixel_to_geo(tile_id, det.pixel.cx, det.pixel.cy) else {
                continue;
            };
            by_tile.entry(tile_id).or_default().push(candidates.len());
            candidates.push(Candidate {
                tile: tile_id.clone(),
                slot,
                center,
                detection: det.clone(),
            });
        }
    }
    stage.candidates = candidates.len();

    let mut sets = DisjointSet::new(candidates.len());
    if !criteria.is_disabled() {
        for &(ta, tb) in &tile_pairs {
            let (Some(ga), Some(gb)) = (catalog.get(ta), catalog.get(tb)) else {
                continue;
            };
            let resolution = ga.resolution_m().max(gb.resolution_m());
            let tile_criteria = criteria.with_max_distance(
                criteria
                    .max_distance
                    .map(|_| params.distance_threshold_m(resolution)),
            );
            let (Some(left), Some(right)) = (by_tile.get(ta), by_tile.get(tb)) else {
                continue;
            };
            for &i in left {
                for &j in right {
                    stage.comparisons += 1;
                    let (a, b) = (&candidates[i], &candidates[j]);
                    if !tile_criteria.classes_compatible(&a.detection, &b.detection) {
                        continue;
                    }
                    let distance = (a.center[0] - b.center[0]).hypot(a.center[1] - b.center[1]);
                    let iou = a.detection.envelope.iou(&b.detection.envelope);
                    if tile_criteria.decide(distance, iou).is_some() {
                        sets.union(i, j);
                    }
                }
            }
        }
    }

    let mut edits: BTreeMap<TileId, TileEdits> = BTreeMap::new();
    for mut members in sets.groups().into_iter().filter(|g| g.len() > 1) {
        members.sort_by(|&x, &y| preference(&candidates[x].detection, &candidates[y].detection));
        let Some((&winner, losers)) = members.split_first() else {
            continue;
        };
        let kept = candidates[winner].detection.id.clone();

        let mut absorbed_size = 0usize;
        let mut absorbed = Vec::new();
        for &loser in losers {
            let cand = &candidates[loser];
            let Some(lost) = reports.get(&cand.tile).map(|r| &r.resolved[cand.slot]) else {
                continue;
            };
            absorbed_size += lost.cluster_size;
            absorbed.push(DiscardedMember {
                id: lost.id().clone(),
                confidence: lost.confidence(),
            });
            absorbed.extend(lost.discarded.iter().cloned());
            stage.removed.push(CrossTileRemoval {
                id: lost.id().clone(),
                confidence: lost.confidence(),
                kept: kept.clone(),
            });
            edits
                .entry(cand.tile.clone())
                .or_default()
                .removed
                .insert(cand.slot);
        }

        let win = &candidates[winner];
        edits
            .entry(win.tile.clone())
            .or_default()
            .absorbed
            .insert(win.slot, (absorbed_size, absorbed));
    }

    stage.removed.sort_by(|a, b| a.id.cmp(&b.id));
    stage.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    debug!(
        "cross-tile: {} touching tile pairs, {} candidates, {} comparisons, {} removed",
        stage.tile_pairs,
        stage.candidates,
        stage.comparisons,
        stage.removed.len()
    );

    let outcomes = outcomes
        .into_iter()
        .map(|outcome| match outcome {
            TileOutcome::Resolved(report) | TileOutcome::Empty(report) => {
                match edits.remove(report.tile_id()) {
                    Some(tile_edits) => TileOutcome::from_report(rebuild(report, &tile_edits)),
                    None => TileOutcome::from_report(report),
                }
            }
            failed => failed,
        })
        .collect();
    (outcomes, stage)
}

/// Pairs `(a, b)`, `a < b` by tile id, of catalogued tiles sharing a CRS
/// whose envelopes touch.
fn touching_tiles(catalog: &TileCatalog) -> Vec<(&TileId, &TileId)> {
    let tiles: Vec<&TileGeometry> = catalog.iter().collect();
    let bounds: Vec<TileBounds> = tiles
        .iter()
        .enumerate()
        .map(|(slot, tile)| TileBounds {
            slot,
            aabb: search_box(tile),
        })
        .collect();
    let index = RTree::bulk_load(bounds);

    let mut pairs = Vec::new();
    for (a, &tile) in tiles.iter().enumerate() {
        for hit in index.locate_in_envelope_intersecting(&search_box(tile)) {
            let other = tiles[hit.slot];
            if hit.slot > a && other.crs() == tile.crs() {
                pairs.push((tile.tile_id(), other.tile_id()));
            }
        }
    }
    pairs.sort_unstable();
    pairs
}

fn search_box(tile: &TileGeometry) -> AABB<[f64; 2]> {
    tile.envelope().expanded(tile.resolution_m()).aabb()
}

/// New report of a tile after the round: losers dropped, winners enlarged.
fn rebuild(report: TileReport, edits: &TileEdits) -> TileReport {
    let TileReport {
        geometry,
        envelope,
        resolved,
        diagnostics,
    } = report;
    let resolved: Vec<ResolvedDetection> = resolved
        .into_iter()
        .enumerate()
        .filter(|(slot, _)| !edits.removed.contains(slot))
        .map(|(slot, kept)| match edits.absorbed.get(&slot) {
            Some((size, members)) => absorb(kept, *size, members),
            None => kept,
        })
        .collect();
    let diagnostics = TileDiagnostics {
        cross_tile_removed: diagnostics.cross_tile_removed + edits.removed.len(),
        resolved: resolved.len(),
        ..diagnostics
    };
    TileReport {
        geometry,
        envelope,
        resolved,
        diagnostics,
    }
}

fn absorb(kept: ResolvedDetection, size: usize, members: &[DiscardedMember]) -> ResolvedDetection {
    let discarded = kept
        .discarded
        .into_iter()
        .chain(members.iter().cloned())
        .collect();
    ResolvedDetection {
        cluster_size: kept.cluster_size + size,
        discarded,
        ..kept
    }
}
