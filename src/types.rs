use crate::geometry::{GeoEnvelope, PixelBox};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a source raster tile (e.g. `2587_1133`, the km grid origin).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(pub String);

impl TileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable key of a patch inside its tile grid.
///
/// Ordering is lexical over `(tile_id, row, col)`; the resolver relies on it
/// for deterministic tie-breaking.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchKey {
    pub tile_id: TileId,
    pub row: u32,
    pub col: u32,
}

impl PatchKey {
    pub fn new(tile_id: TileId, row: u32, col: u32) -> Self {
        Self { tile_id, row, col }
    }
}

impl fmt::Display for PatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.tile_id, self.row, self.col)
    }
}

/// A detection's identity: owning patch plus its index within that patch.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionId {
    pub patch: PatchKey,
    /// Position in the patch's detection list, i.e. among parsed label lines.
    pub index: u32,
}

impl fmt::Display for DetectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.patch, self.index)
    }
}

/// Detector box in patch-normalized units: centre and size as fractions of
/// the patch size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// One detection as emitted by the detector for one patch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    pub class_id: u32,
    pub bbox: NormalizedBox,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(class_id: u32, cx: f32, cy: f32, w: f32, h: f32, confidence: f32) -> Self {
        Self {
            class_id,
            bbox: NormalizedBox { cx, cy, w, h },
            confidence,
        }
    }

    /// Checks the normalized-box convention: centre in `[0,1]`, size in
    /// `(0,1]`, confidence in `[0,1]`.
    pub fn validate(&self) -> Result<(), String> {
        let NormalizedBox { cx, cy, w, h } = self.bbox;
        if !(0.0..=1.0).contains(&cx) || !(0.0..=1.0).contains(&cy) {
            return Err(format!("centre ({cx}, {cy}) outside [0,1]"));
        }
        if !(w > 0.0 && w <= 1.0) || !(h > 0.0 && h <= 1.0) {
            return Err(format!("size ({w}, {h}) outside (0,1]"));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0,1]", self.confidence));
        }
        Ok(())
    }
}

/// All raw detections reported for a single patch, in detector order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatchDetections {
    pub patch: PatchKey,
    pub detections: Vec<RawDetection>,
}

/// A raw detection lifted into tile pixel space and the tile's CRS.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDetection {
    pub id: DetectionId,
    pub class_id: u32,
    pub confidence: f32,
    /// Box in tile-global pixels.
    pub pixel: PixelBox,
    /// Box centre in CRS units.
    pub geo_center: [f64; 2],
    /// Pixel-box corners mapped through the affine transform (TL, TR, BR, BL).
    pub footprint: [[f64; 2]; 4],
    pub envelope: GeoEnvelope,
}

/// Governing match metric of a cluster: closest centre distance and largest
/// overlap among the pairs that formed it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetric {
    pub distance_px: f64,
    pub iou: f64,
}

impl MatchMetric {
    pub fn absorb(&mut self, other: MatchMetric) {
        self.distance_px = self.distance_px.min(other.distance_px);
        self.iou = self.iou.max(other.iou);
    }
}

/// Detections judged to be the same physical object. Members index into the
/// detection slice the cluster was built from.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCluster {
    pub members: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<MatchMetric>,
}

impl DuplicateCluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// A cluster member that lost to the representative; kept for calibration.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardedMember {
    pub id: DetectionId,
    pub confidence: f32,
}

/// The representative chosen for one duplicate cluster.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDetection {
    pub detection: GlobalDetection,
    pub cluster_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<MatchMetric>,
    pub discarded: Vec<DiscardedMember>,
}

impl ResolvedDetection {
    pub fn id(&self) -> &DetectionId {
        &self.detection.id
    }

    pub fn confidence(&self) -> f32 {
        self.detection.confidence
    }
}
