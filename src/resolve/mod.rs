//! Cluster resolution: one representative per duplicate cluster.
//!
//! The representative is the most confident member. Equal confidences fall
//! back to the lowest [`DetectionId`], i.e. the lowest `(tile_id, row, col)`
//! patch and then the lowest index inside it, which makes the choice
//! independent of input order and of parallel scheduling. Losing members are
//! kept on the representative as [`DiscardedMember`]s for calibration.

pub mod nms;

pub use nms::{global_nms, NmsOutcome};

use crate::types::{DiscardedMember, DuplicateCluster, GlobalDetection, ResolvedDetection};
use std::cmp::Ordering;

/// Total preference order: higher confidence first, then lower id.
pub fn preference(a: &GlobalDetection, b: &GlobalDetection) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.id.cmp(&b.id))
}

/// Picks the representative of every cluster. Output is sorted by the
/// representative's id.
pub fn resolve_clusters(
    detections: &[GlobalDetection],
    clusters: &[DuplicateCluster],
) -> Vec<ResolvedDetection> {
    let mut resolved: Vec<ResolvedDetection> = clusters
        .iter()
        .filter_map(|cluster| resolve_cluster(detections, cluster))
        .collect();
    resolved.sort_by(|a, b| a.id().cmp(b.id()));
    resolved
}

fn resolve_cluster(
    detections: &[GlobalDetection],
    cluster: &DuplicateCluster,
) -> Option<ResolvedDetection> {
    let mut members: Vec<&GlobalDetection> =
        cluster.members.iter().map(|&i| &detections[i]).collect();
    members.sort_by(|a, b| preference(a, b));
    let (winner, losers) = members.split_first()?;
    Some(ResolvedDetection {
        detection: (*winner).clone(),
        cluster_size: members.len(),
        metric: cluster.metric,
        discarded: losers
            .iter()
            .map(|d| DiscardedMember {
                id: d.id.clone(),
                confidence: d.confidence,
            })
            .collect(),
    })
}
