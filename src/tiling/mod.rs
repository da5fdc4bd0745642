//! Tile geometry model.
//!
//! A tile is a georeferenced raster of known pixel extent. [`TileMeta`] is
//! the raw metadata handed over by the raster-reading side; [`TileGeometry`]
//! is the validated, immutable form used by the pipeline: it owns the
//! [`PatchGrid`] derived from the run parameters and the affine
//! [`GeoTransform`] that maps tile pixels into the tile's CRS.
//!
//! Validation never guesses: a tile without a usable transform is a
//! georeferencing error, and a tile without a CRS only passes when a fallback
//! CRS was configured explicitly.

pub mod grid;
pub mod naming;
pub mod transform;

pub use grid::{PatchGrid, PatchWindow};
pub use naming::{parse_patch_path, parse_patch_stem};
pub use transform::GeoTransform;

use crate::error::{ReconcileError, Result};
use crate::geometry::GeoEnvelope;
use crate::reconciler::ReconcileParams;
use crate::types::TileId;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raster metadata for one tile, as supplied by the raster reader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileMeta {
    pub tile_id: TileId,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Affine coefficients `[a, b, c, d, e, f]`; absent for non-georeferenced rasters.
    #[serde(default)]
    pub transform: Option<[f64; 6]>,
    #[serde(default)]
    pub crs: Option<String>,
    /// Ground sample distance in metres per pixel; derived from the transform when absent.
    #[serde(default)]
    pub resolution_m: Option<f64>,
}

impl TileMeta {
    pub fn geo_transform(&self) -> Result<GeoTransform> {
        let coeffs = self
            .transform
            .ok_or_else(|| ReconcileError::georeferencing(&self.tile_id, "raster has no affine transform"))?;
        GeoTransform::from_coefficients(coeffs).ok_or_else(|| {
            ReconcileError::georeferencing(
                &self.tile_id,
                format!("affine transform {coeffs:?} is singular or not finite"),
            )
        })
    }

    /// Maps a tile pixel to map coordinates, failing for non-georeferenced tiles.
    pub fn pixel_to_geo(&self, px: f64, py: f64) -> Result<[f64; 2]> {
        Ok(self.geo_transform()?.apply(px, py))
    }
}

/// Validated geometry of one tile under a given patch configuration.
#[derive(Clone, Debug)]
pub struct TileGeometry {
    tile_id: TileId,
    crs: String,
    resolution_m: f64,
    transform: GeoTransform,
    grid: PatchGrid,
}

impl TileGeometry {
    pub fn new(meta: &TileMeta, params: &ReconcileParams) -> Result<Self> {
        let transform = meta.geo_transform()?;
        let crs = match meta.crs.as_deref().map(str::trim) {
            Some(crs) if !crs.is_empty() => crs.to_string(),
            _ => match &params.fallback_crs {
                Some(fallback) => {
                    warn!(
                        "tile {}: no CRS in raster metadata, using configured fallback {}",
                        meta.tile_id, fallback
                    );
                    fallback.clone()
                }
                None => {
                    return Err(ReconcileError::georeferencing(
                        &meta.tile_id,
                        "raster has no CRS and no fallback_crs is configured",
                    ))
                }
            },
        };
        let resolution_m = match meta.resolution_m {
            Some(res) if res.is_finite() && res > 0.0 => res,
            Some(res) => {
                return Err(ReconcileError::georeferencing(
                    &meta.tile_id,
                    format!("invalid ground resolution {res}"),
                ))
            }
            None => {
                let (sx, sy) = transform.pixel_size();
                0.5 * (sx + sy)
            }
        };
        let grid = PatchGrid::new(meta.width, meta.height, params.patch_size, params.overlap_px)?;
        Ok(Self {
            tile_id: meta.tile_id.clone(),
            crs,
            resolution_m,
            transform,
            grid,
        })
    }

    pub fn tile_id(&self) -> &TileId {
        &self.tile_id
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn resolution_m(&self) -> f64 {
        self.resolution_m
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn grid(&self) -> &PatchGrid {
        &self.grid
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    pub fn patch_offset(&self, row: u32, col: u32) -> (u32, u32) {
        self.grid.patch_offset(row, col)
    }

    pub fn pixel_to_geo(&self, px: f64, py: f64) -> [f64; 2] {
        self.transform.apply(px, py)
    }

    /// Ground footprint of the whole tile.
    pub fn envelope(&self) -> GeoEnvelope {
        let (w, h) = (self.width() as f64, self.height() as f64);
        let corners = self
            .transform
            .apply_points(&[[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]]);
        GeoEnvelope::from_quad(&corners)
    }

    /// Shortest pixel distance from a tile-pixel position to the tile border.
    pub fn edge_distance_px(&self, px: f64, py: f64) -> f64 {
        let (w, h) = (self.width() as f64, self.height() as f64);
        px.min(w - px).min(py).min(h - py)
    }
}

/// Validated tiles of a batch, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct TileCatalog {
    tiles: BTreeMap<TileId, TileGeometry>,
}

impl TileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tile: TileGeometry) -> Option<TileGeometry> {
        self.tiles.insert(tile.tile_id.clone(), tile)
    }

    pub fn get(&self, tile_id: &TileId) -> Option<&TileGeometry> {
        self.tiles.get(tile_id)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileGeometry> {
        self.tiles.values()
    }

    /// Maps a tile pixel to map coordinates of the named tile.
    pub fn pixel_to_geo(&self, tile_id: &TileId, px: f64, py: f64) -> Result<[f64; 2]> {
        self.get(tile_id)
            .map(|tile| tile.pixel_to_geo(px, py))
            .ok_or_else(|| ReconcileError::georeferencing(tile_id, "tile is not georeferenced in this batch"))
    }
}
