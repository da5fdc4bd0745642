//! Duplicate clustering across neighbouring patches.
//!
//! Overlapping patches see the same object more than once. Detections are
//! bucketed by owning patch; each bucket is compared only against buckets of
//! adjacent patches, those one row or column apart or diagonal (see
//! [`PatchGrid::forward_neighbors`]). Patches further apart are never
//! compared, even when a heavy overlap lets them see the same ground.
//! Detections of the same patch are never compared here; the model's own near-duplicates are the
//! global NMS pass's business.
//!
//! Every qualifying pair is unioned in a [`DisjointSet`], so chains at patch
//! corners (up to four patches see the same spot) collapse into one cluster
//! even when not every pair in the chain matches directly. The resulting
//! clusters partition the input: unmatched detections become singletons.

pub mod matching;
pub mod union_find;

pub use matching::{MatchCriteria, MatchRule, PairMatch};
pub use union_find::DisjointSet;

use crate::diagnostics::DuplicatePair;
use crate::tiling::PatchGrid;
use crate::types::{DuplicateCluster, GlobalDetection, MatchMetric};
use log::debug;
use std::collections::BTreeMap;

/// Clusters of one tile plus the pairs that formed them.
#[derive(Debug, Default)]
pub struct ClusterOutput {
    /// Ordered by smallest member index.
    pub clusters: Vec<DuplicateCluster>,
    pub pairs: Vec<DuplicatePair>,
    pub comparisons: usize,
}

/// Groups the detections of one tile into duplicate clusters.
///
/// `detections` must all belong to the tile described by `grid`.
pub fn cluster_detections(
    detections: &[GlobalDetection],
    grid: &PatchGrid,
    criteria: &MatchCriteria,
) -> ClusterOutput {
    let mut buckets: BTreeMap<(u32, u32), Vec<usize>> = BTreeMap::new();
    for (idx, det) in detections.iter().enumerate() {
        buckets
            .entry((det.id.patch.row, det.id.patch.col))
            .or_default()
            .push(idx);
    }

    let mut sets = DisjointSet::new(detections.len());
    let mut matches: Vec<(usize, usize, PairMatch)> = Vec::new();
    let mut comparisons = 0usize;

    if !criteria.is_disabled() {
        for (&(row, col), members) in &buckets {
            for neighbour in grid.forward_neighbors(row, col) {
                let Some(others) = buckets.get(&neighbour) else {
                    continue;
                };
                for &i in members {
                    for &j in others {
                        comparisons += 1;
                        if let Some(m) = criteria.evaluate(&detections[i], &detections[j]) {
                            sets.union(i, j);
                            matches.push((i, j, m));
                        }
                    }
                }
            }
        }
    }

    let groups = sets.groups();
    let mut cluster_of = vec![0usize; detections.len()];
    for (slot, group) in groups.iter().enumerate() {
        for &m in group {
            cluster_of[m] = slot;
        }
    }
    let mut metrics: Vec<Option<MatchMetric>> = vec![None; groups.len()];
    let mut pairs = Vec::with_capacity(matches.len());
    for (i, j, m) in matches {
        let metric = MatchMetric {
            distance_px: m.distance,
            iou: m.iou,
        };
        metrics[cluster_of[i]].get_or_insert(metric).absorb(metric);
        let (a, b) = ordered(&detections[i], &detections[j]);
        pairs.push(DuplicatePair {
            a: a.id.clone(),
            b: b.id.clone(),
            distance_px: m.distance,
            iou: m.iou,
            rule: m.rule,
        });
    }
    pairs.sort_by(|x, y| (&x.a, &x.b).cmp(&(&y.a, &y.b)));

    let clusters: Vec<DuplicateCluster> = groups
        .into_iter()
        .zip(metrics)
        .map(|(members, metric)| DuplicateCluster { members, metric })
        .collect();

    debug!(
        "clustered {} detections into {} clusters ({} pairs, {} comparisons)",
        detections.len(),
        clusters.len(),
        pairs.len(),
        comparisons
    );

    ClusterOutput {
        clusters,
        pairs,
        comparisons,
    }
}

fn ordered<'a>(
    a: &'a GlobalDetection,
    b: &'a GlobalDetection,
) -> (&'a GlobalDetection, &'a GlobalDetection) {
    if a.id <= b.id {
        (a, b)
    } else {
        (b, a)
    }
}
