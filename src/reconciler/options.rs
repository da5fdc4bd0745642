//! Parameter types configuring the reconciliation stages.
//!
//! Groups the patch-grid geometry, the duplicate matching rules, the global
//! NMS pass and the optional cross-tile round.
//!
//! Defaults follow the production patching scheme: 640 px patches with a
//! 210 px overlap at 0.5 m/px. The distance threshold is expressed in tile
//! pixels, so its ground meaning is `distance_threshold_px × resolution_m`
//! (15 px × 0.5 m/px = 7.5 m by default).

use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};

/// Run-wide parameters for the reconciliation pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileParams {
    /// Patch edge length in pixels.
    pub patch_size: u32,
    /// Overlap between neighbouring patches in pixels (`stride = patch_size - overlap_px`).
    pub overlap_px: u32,
    /// Centre-distance threshold in tile pixels. `0` disables the distance rule.
    pub distance_threshold_px: f64,
    /// IoU threshold on geographic boxes. `0` disables the overlap rule.
    pub iou_threshold: f64,
    /// IoU threshold of the global greedy NMS pass. `0` disables it.
    pub global_nms_iou: f64,
    /// Only match detections carrying the same class id.
    pub require_same_class: bool,
    /// CRS applied to tiles that carry none. `None` makes such tiles fail.
    pub fallback_crs: Option<String>,
    /// Enables the staged cross-tile round when set.
    pub cross_tile: Option<CrossTileParams>,
}

impl Default for ReconcileParams {
    fn default() -> Self {
        Self {
            patch_size: 640,
            overlap_px: 210,
            distance_threshold_px: 15.0,
            iou_threshold: 0.5,
            global_nms_iou: 0.0,
            require_same_class: false,
            fallback_crs: None,
            cross_tile: None,
        }
    }
}

/// Cross-tile round configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossTileParams {
    /// Only detections whose centre lies within this many pixels of their
    /// tile edge take part.
    pub band_px: f64,
}

impl Default for CrossTileParams {
    fn default() -> Self {
        Self { band_px: 32.0 }
    }
}

impl ReconcileParams {
    /// Distance between consecutive patch origins.
    pub fn stride(&self) -> i64 {
        self.patch_size as i64 - self.overlap_px as i64
    }

    /// Ground distance (metres) that the pixel threshold represents at `resolution_m`.
    pub fn distance_threshold_m(&self, resolution_m: f64) -> f64 {
        self.distance_threshold_px * resolution_m
    }

    /// Rejects degenerate grids and out-of-range thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.patch_size == 0 {
            return Err(config_err("patch_size must be positive"));
        }
        if self.stride() <= 0 {
            return Err(config_err(format!(
                "overlap_px ({}) must be smaller than patch_size ({})",
                self.overlap_px, self.patch_size
            )));
        }
        if !self.distance_threshold_px.is_finite() || self.distance_threshold_px < 0.0 {
            return Err(config_err(format!(
                "distance_threshold_px must be finite and non-negative, got {}",
                self.distance_threshold_px
            )));
        }
        check_unit("iou_threshold", self.iou_threshold)?;
        check_unit("global_nms_iou", self.global_nms_iou)?;
        if let Some(cross) = &self.cross_tile {
            if !cross.band_px.is_finite() || cross.band_px < 0.0 {
                return Err(config_err(format!(
                    "cross_tile.band_px must be finite and non-negative, got {}",
                    cross.band_px
                )));
            }
        }
        if let Some(crs) = &self.fallback_crs {
            if crs.trim().is_empty() {
                return Err(config_err("fallback_crs must not be blank"));
            }
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(config_err(format!("{name} must lie in [0,1], got {value}")))
    }
}

fn config_err(msg: impl Into<String>) -> ReconcileError {
    ReconcileError::Configuration(msg.into())
}
