//! Axis-aligned box primitives shared by the unifier, clusterer and NMS.

use rstar::AABB;
use serde::Serialize;

/// Axis-aligned box in tile-global pixels, centre/size form.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PixelBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl PixelBox {
    /// Corners in TL, TR, BR, BL order (image rows grow downwards).
    pub fn corners(&self) -> [[f64; 2]; 4] {
        let (x0, y0) = (self.cx - 0.5 * self.w, self.cy - 0.5 * self.h);
        let (x1, y1) = (self.cx + 0.5 * self.w, self.cy + 0.5 * self.h);
        [[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
    }

    pub fn center_distance(&self, other: &PixelBox) -> f64 {
        (self.cx - other.cx).hypot(self.cy - other.cy)
    }
}

/// Axis-aligned envelope in CRS units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoEnvelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl GeoEnvelope {
    /// Smallest envelope containing the four corners of a quadrilateral.
    pub fn from_quad(quad: &[[f64; 2]; 4]) -> Self {
        let [first, rest @ ..] = quad;
        rest.iter().fold(
            Self {
                min_x: first[0],
                min_y: first[1],
                max_x: first[0],
                max_y: first[1],
            },
            |env, p| Self {
                min_x: env.min_x.min(p[0]),
                min_y: env.min_y.min(p[1]),
                max_x: env.max_x.max(p[0]),
                max_y: env.max_y.max(p[1]),
            },
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> [f64; 2] {
        [
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        ]
    }

    pub fn intersection_area(&self, other: &GeoEnvelope) -> f64 {
        let w = self.max_x.min(other.max_x) - self.min_x.max(other.min_x);
        let h = self.max_y.min(other.max_y) - self.min_y.max(other.min_y);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Intersection over union; `0.0` when the union is degenerate.
    pub fn iou(&self, other: &GeoEnvelope) -> f64 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Spatial-index box; rstar treats shared edges as intersecting.
    pub fn aabb(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstar::Envelope;

    fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> GeoEnvelope {
        GeoEnvelope {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[test]
    fn iou_of_half_shifted_squares() {
        let a = env(0.0, 0.0, 2.0, 2.0);
        let b = env(1.0, 0.0, 3.0, 2.0);
        // inter = 2, union = 6
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn disjoint_and_degenerate_envelopes_have_zero_iou() {
        let a = env(0.0, 0.0, 1.0, 1.0);
        let b = env(5.0, 5.0, 6.0, 6.0);
        assert_eq!(a.iou(&b), 0.0);
        let flat = env(0.0, 0.0, 0.0, 0.0);
        assert_eq!(flat.iou(&flat), 0.0);
    }

    #[test]
    fn quad_envelope_orders_flipped_axes() {
        // north-up rasters flip the y axis
        let e = GeoEnvelope::from_quad(&[[0.0, 10.0], [4.0, 10.0], [4.0, 8.0], [0.0, 8.0]]);
        assert_eq!((e.min_x, e.min_y, e.max_x, e.max_y), (0.0, 8.0, 4.0, 10.0));
        assert_eq!(e.center(), [2.0, 9.0]);
    }

    #[test]
    fn touching_envelopes_touch_but_do_not_intersect() {
        let a = env(0.0, 0.0, 1.0, 1.0);
        let b = env(1.0, 0.0, 2.0, 1.0);
        assert!(a.aabb().intersects(&b.aabb()));
        assert_eq!(a.intersection_area(&b), 0.0);
    }

    #[test]
    fn pixel_box_corners_are_clockwise_from_top_left() {
        let b = PixelBox {
            cx: 10.0,
            cy: 20.0,
            w: 4.0,
            h: 2.0,
        };
        assert_eq!(
            b.corners(),
            [[8.0, 19.0], [12.0, 19.0], [12.0, 21.0], [8.0, 21.0]]
        );
    }
}
