use nalgebra::{Matrix3, Vector3};

const EPS: f64 = 1e-12;

/// Affine pixel→map transform held as a homogeneous 3×3 matrix.
///
/// Coefficients follow the rasterio `Affine(a, b, c, d, e, f)` order:
/// `x = a·col + b·row + c`, `y = d·col + e·row + f`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform {
    mtx: Matrix3<f64>,
}

impl GeoTransform {
    /// Builds a transform, returning `None` when a coefficient is not finite
    /// or the linear part is singular.
    pub fn from_coefficients(c: [f64; 6]) -> Option<Self> {
        if c.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let mtx = Matrix3::new(c[0], c[1], c[2], c[3], c[4], c[5], 0.0, 0.0, 1.0);
        let det = c[0] * c[4] - c[1] * c[3];
        if det.abs() <= EPS {
            return None;
        }
        Some(Self { mtx })
    }

    /// Maps a pixel position (column, row) to map coordinates.
    pub fn apply(&self, px: f64, py: f64) -> [f64; 2] {
        let v = self.mtx * Vector3::new(px, py, 1.0);
        [v[0], v[1]]
    }

    pub fn apply_points<const N: usize>(&self, pts: &[[f64; 2]; N]) -> [[f64; 2]; N] {
        pts.map(|p| self.apply(p[0], p[1]))
    }

    /// Ground size of one pixel along columns and rows.
    pub fn pixel_size(&self) -> (f64, f64) {
        let m = &self.mtx;
        (
            m[(0, 0)].hypot(m[(1, 0)]),
            m[(0, 1)].hypot(m[(1, 1)]),
        )
    }
}
