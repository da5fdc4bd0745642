use crate::reconciler::ReconcileParams;
use crate::types::GlobalDetection;
use serde::{Deserialize, Serialize};

/// Which rule declared a pair duplicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchRule {
    Distance,
    Overlap,
    Both,
}

/// Outcome of comparing two detections that matched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairMatch {
    pub distance: f64,
    pub iou: f64,
    pub rule: MatchRule,
}

/// Duplicate matching rules. Either rule qualifies a pair.
///
/// The distance is unit-agnostic: the in-tile clusterer feeds tile pixels,
/// the cross-tile round feeds metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchCriteria {
    /// Centre distance strictly below this qualifies.
    pub max_distance: Option<f64>,
    /// IoU strictly above this qualifies.
    pub min_iou: Option<f64>,
    pub same_class: bool,
}

impl MatchCriteria {
    /// In-tile criteria; zero thresholds disable their rule.
    pub fn from_params(params: &ReconcileParams) -> Self {
        Self {
            max_distance: (params.distance_threshold_px > 0.0).then_some(params.distance_threshold_px),
            min_iou: (params.iou_threshold > 0.0).then_some(params.iou_threshold),
            same_class: params.require_same_class,
        }
    }

    pub fn with_max_distance(mut self, max_distance: Option<f64>) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.max_distance.is_none() && self.min_iou.is_none()
    }

    pub fn classes_compatible(&self, a: &GlobalDetection, b: &GlobalDetection) -> bool {
        !self.same_class || a.class_id == b.class_id
    }

    /// Applies the rules to precomputed metrics.
    pub fn decide(&self, distance: f64, iou: f64) -> Option<MatchRule> {
        let by_distance = self.max_distance.is_some_and(|t| distance < t);
        let by_overlap = self.min_iou.is_some_and(|t| iou > t);
        match (by_distance, by_overlap) {
            (true, true) => Some(MatchRule::Both),
            (true, false) => Some(MatchRule::Distance),
            (false, true) => Some(MatchRule::Overlap),
            (false, false) => None,
        }
    }

    /// Compares two detections of the same tile: pixel-centre distance and
    /// IoU of the geographic envelopes.
    pub fn evaluate(&self, a: &GlobalDetection, b: &GlobalDetection) -> Option<PairMatch> {
        if !self.classes_compatible(a, b) {
            return None;
        }
        let distance = a.pixel.center_distance(&b.pixel);
        let iou = a.envelope.iou(&b.envelope);
        self.decide(distance, iou).map(|rule| PairMatch {
            distance,
            iou,
            rule,
        })
    }
}
