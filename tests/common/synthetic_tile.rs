use patch_reconcile::tiling::TileMeta;
use patch_reconcile::types::{PatchDetections, PatchKey, RawDetection, TileId};

pub const PATCH: f32 = 640.0;
pub const STRIDE: f32 = 430.0;
/// Ground resolution of the synthetic tiles, metres per pixel.
pub const RES: f64 = 0.5;
/// Box size used by the fixtures, as a fraction of the patch (12.8 px).
pub const BOX: f32 = 0.02;

/// North-up tile whose top-left corner sits at `(origin_x, origin_y)`.
pub fn tile_meta(tile_id: &str, size: u32, origin_x: f64, origin_y: f64) -> TileMeta {
    TileMeta {
        tile_id: TileId::new(tile_id),
        width: size,
        height: size,
        transform: Some([RES, 0.0, origin_x, 0.0, -RES, origin_y]),
        crs: Some("EPSG:2056".to_string()),
        resolution_m: Some(RES),
    }
}

/// Detection of a fixed-size box at patch-normalized `(cx, cy)`.
pub fn raw(cx: f32, cy: f32, confidence: f32) -> RawDetection {
    RawDetection::new(0, cx, cy, BOX, BOX, confidence)
}

/// Detection seen by patch `(row, col)` of an object at tile pixel `(gx, gy)`.
pub fn raw_at_global(row: u32, col: u32, gx: f32, gy: f32, confidence: f32) -> RawDetection {
    let cx = (gx - col as f32 * STRIDE) / PATCH;
    let cy = (gy - row as f32 * STRIDE) / PATCH;
    assert!(
        (0.0..=1.0).contains(&cx) && (0.0..=1.0).contains(&cy),
        "({gx}, {gy}) is not visible from patch ({row}, {col})"
    );
    raw(cx, cy, confidence)
}

pub fn patch(tile_id: &str, row: u32, col: u32, detections: Vec<RawDetection>) -> PatchDetections {
    PatchDetections {
        patch: PatchKey::new(TileId::new(tile_id), row, col),
        detections,
    }
}
