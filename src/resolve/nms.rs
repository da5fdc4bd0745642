//! Global greedy non-max suppression over resolved detections.
//!
//! Catches near-duplicates the patch grid does not explain, e.g. two boxes
//! emitted by the model for one object inside a single patch. Candidates are
//! visited in [`preference`](super::preference) order; a box is accepted
//! unless its envelope IoU with an already accepted box exceeds the
//! threshold.

use super::preference;
use crate::diagnostics::Suppression;
use crate::types::ResolvedDetection;
use log::debug;

#[derive(Debug, Default)]
pub struct NmsOutcome {
    /// Sorted by id.
    pub kept: Vec<ResolvedDetection>,
    pub suppressed: Vec<Suppression>,
}

/// Runs greedy NMS; `iou_threshold <= 0` disables the pass.
pub fn global_nms(resolved: Vec<ResolvedDetection>, iou_threshold: f64) -> NmsOutcome {
    if iou_threshold <= 0.0 || resolved.len() < 2 {
        return NmsOutcome {
            kept: resolved,
            suppressed: Vec::new(),
        };
    }

    let mut candidates = resolved;
    candidates.sort_by(|a, b| preference(&a.detection, &b.detection));

    let mut kept: Vec<ResolvedDetection> = Vec::with_capacity(candidates.len());
    let mut suppressed = Vec::new();
    for cand in candidates {
        let blocker = kept.iter().find_map(|k| {
            let iou = k.detection.envelope.iou(&cand.detection.envelope);
            (iou > iou_threshold).then_some((k, iou))
        });
        match blocker {
            Some((k, iou)) => suppressed.push(Suppression {
                id: cand.id().clone(),
                confidence: cand.confidence(),
                suppressed_by: k.id().clone(),
                iou,
            }),
            None => kept.push(cand),
        }
    }

    debug!(
        "global NMS (iou>{iou_threshold}): kept {}, suppressed {}",
        kept.len(),
        suppressed.len()
    );
    kept.sort_by(|a, b| a.id().cmp(b.id()));
    NmsOutcome { kept, suppressed }
}
