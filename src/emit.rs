//! Vector emitter: resolved detections as georeferenced polygons.
//!
//! Each [`ResolvedDetection`] becomes one [`Feature`]: the footprint polygon
//! (the four affine-mapped pixel-box corners) plus the attribute
//! record GIS consumers expect. Features accumulate in a [`VectorLayer`]
//! bound to exactly one CRS; the layer refuses features from another CRS
//! instead of reprojecting them. Layers serialize as GeoJSON
//! FeatureCollections with a named `crs` member.
//!
//! An empty tile is reported as [`ReconcileError::EmptyResult`] by
//! [`emit_tile`]; callers treat it as a status, not a failure.

use crate::error::{ReconcileError, Result};
use crate::io::write_json_file;
use crate::types::{ResolvedDetection, TileId};
use geo_types::{LineString, Polygon};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Attribute record of one emitted polygon.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureProperties {
    pub confidence: f32,
    pub class: u32,
    pub source_tile_id: TileId,
    pub source_patch_row: u32,
    pub source_patch_col: u32,
    pub cluster_size: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    /// Footprint in CRS units.
    pub footprint: Polygon<f64>,
    pub properties: FeatureProperties,
}

impl Feature {
    pub fn from_resolved(resolved: &ResolvedDetection) -> Self {
        let det = &resolved.detection;
        Self {
            footprint: Polygon::new(LineString::from(det.footprint.to_vec()), vec![]),
            properties: FeatureProperties {
                confidence: det.confidence,
                class: det.class_id,
                source_tile_id: det.id.patch.tile_id.clone(),
                source_patch_row: det.id.patch.row,
                source_patch_col: det.id.patch.col,
                cluster_size: resolved.cluster_size,
            },
        }
    }

    /// Closed exterior ring, first point repeated last.
    pub fn exterior_ring(&self) -> Vec<[f64; 2]> {
        self.footprint
            .exterior()
            .coords()
            .map(|c| [c.x, c.y])
            .collect()
    }

    fn to_geojson(&self) -> Value {
        json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [self.exterior_ring()],
            },
            "properties": self.properties,
        })
    }
}

/// Output layer tagged with a single CRS.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorLayer {
    pub name: String,
    pub crs: String,
    pub features: Vec<Feature>,
}

impl VectorLayer {
    pub fn new(name: impl Into<String>, crs: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            crs: crs.into(),
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Appends detections georeferenced in `crs`; returns how many were added.
    pub fn append(&mut self, crs: &str, detections: &[ResolvedDetection]) -> Result<usize> {
        if crs != self.crs {
            return Err(ReconcileError::CrsMismatch {
                expected: self.crs.clone(),
                found: crs.to_string(),
            });
        }
        self.features
            .extend(detections.iter().map(Feature::from_resolved));
        Ok(detections.len())
    }

    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "name": self.name,
            "crs": {
                "type": "name",
                "properties": { "name": crs_urn(&self.crs) },
            },
            "features": self.features.iter().map(Feature::to_geojson).collect::<Vec<_>>(),
        })
    }

    pub fn write_geojson(&self, path: &Path) -> Result<()> {
        write_json_file(path, &self.to_geojson())
    }
}

/// Builds the layer of a single tile; `EmptyResult` when nothing survived.
pub fn emit_tile(
    tile_id: &TileId,
    crs: &str,
    detections: &[ResolvedDetection],
) -> Result<VectorLayer> {
    if detections.is_empty() {
        return Err(ReconcileError::EmptyResult {
            tile_id: tile_id.clone(),
        });
    }
    let mut layer = VectorLayer::new(tile_id.as_str(), crs);
    layer.append(crs, detections)?;
    Ok(layer)
}

/// Merges per-tile detections into one layer per distinct CRS, ordered by CRS.
pub fn layers_by_crs<'a, I>(name: &str, tiles: I) -> Vec<VectorLayer>
where
    I: IntoIterator<Item = (&'a str, &'a [ResolvedDetection])>,
{
    let mut layers: BTreeMap<&str, VectorLayer> = BTreeMap::new();
    for (crs, detections) in tiles {
        let layer = layers
            .entry(crs)
            .or_insert_with(|| VectorLayer::new(name, crs));
        layer
            .features
            .extend(detections.iter().map(Feature::from_resolved));
    }
    layers.into_values().collect()
}

/// OGC URN for an `AUTHORITY:CODE` identifier; other strings pass through.
pub fn crs_urn(crs: &str) -> String {
    match crs.split_once(':') {
        Some((authority, code)) if !authority.is_empty() && !code.is_empty() && !code.contains(':') => {
            format!("urn:ogc:def:crs:{authority}::{code}")
        }
        _ => crs.to_string(),
    }
}

/// File-system friendly form of a CRS identifier (`EPSG:2056` → `EPSG_2056`).
pub fn crs_slug(crs: &str) -> String {
    crs.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GeoEnvelope, PixelBox};
    use crate::types::{DetectionId, GlobalDetection, PatchKey};

    fn resolved(row: u32, col: u32, confidence: f32) -> ResolvedDetection {
        let footprint = [
            [100.0, 210.0],
            [110.0, 210.0],
            [110.0, 200.0],
            [100.0, 200.0],
        ];
        ResolvedDetection {
            detection: GlobalDetection {
                id: DetectionId {
                    patch: PatchKey::new(TileId::new("2587_1133"), row, col),
                    index: 0,
                },
                class_id: 2,
                confidence,
                pixel: PixelBox {
                    cx: 5.0,
                    cy: 5.0,
                    w: 10.0,
                    h: 10.0,
                },
                geo_center: [105.0, 205.0],
                footprint,
                envelope: GeoEnvelope::from_quad(&footprint),
            },
            cluster_size: 3,
            metric: None,
            discarded: Vec::new(),
        }
    }

    #[test]
    fn features_carry_closed_ring_and_attributes() {
        let feature = Feature::from_resolved(&resolved(1, 4, 0.9));
        let ring = feature.exterior_ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring[1], [110.0, 210.0]);
        assert_eq!(feature.properties.source_patch_row, 1);
        assert_eq!(feature.properties.source_patch_col, 4);
        assert_eq!(feature.properties.class, 2);
        assert_eq!(feature.properties.cluster_size, 3);
    }

    #[test]
    fn geojson_names_the_crs() {
        let layer = emit_tile(&TileId::new("2587_1133"), "EPSG:2056", &[resolved(0, 0, 0.8)]).unwrap();
        let value = layer.to_geojson();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::2056");
        assert_eq!(value["features"][0]["geometry"]["type"], "Polygon");
        assert_eq!(value["features"][0]["geometry"]["coordinates"][0][4][0], 100.0);
        assert_eq!(value["features"][0]["properties"]["source_tile_id"], "2587_1133");
    }

    #[test]
    fn foreign_crs_is_refused() {
        let mut layer = VectorLayer::new("rocks", "EPSG:2056");
        let err = layer.append("EPSG:21781", &[resolved(0, 0, 0.8)]).unwrap_err();
        assert!(matches!(err, ReconcileError::CrsMismatch { .. }));
        assert!(layer.is_empty());
    }

    #[test]
    fn empty_tile_is_reported_not_emitted() {
        let err = emit_tile(&TileId::new("t"), "EPSG:2056", &[]).unwrap_err();
        assert!(err.is_empty_result());
    }

    #[test]
    fn layers_split_by_crs() {
        let a = vec![resolved(0, 0, 0.8)];
        let b = vec![resolved(0, 1, 0.7), resolved(1, 1, 0.6)];
        let layers = layers_by_crs(
            "rocks",
            [("EPSG:2056", a.as_slice()), ("EPSG:21781", b.as_slice()), ("EPSG:2056", b.as_slice())],
        );
        assert_eq!(layers.len(), 2);
        assert_eq!((layers[0].crs.as_str(), layers[0].len()), ("EPSG:2056", 3));
        assert_eq!((layers[1].crs.as_str(), layers[1].len()), ("EPSG:21781", 2));
    }

    #[test]
    fn urn_and_slug_forms() {
        assert_eq!(crs_urn("EPSG:2056"), "urn:ogc:def:crs:EPSG::2056");
        assert_eq!(crs_urn("urn:ogc:def:crs:OGC::CRS84"), "urn:ogc:def:crs:OGC::CRS84");
        assert_eq!(crs_slug("EPSG:2056"), "EPSG_2056");
    }
}
