//! Math type re-exports and the numeric text conventions shared by the
//! readers and writers.
//!
//! Matrices follow the row-vector convention of the file format (`p' = p * M`,
//! translation in the last row). Sixteen values written row by row are exactly
//! glam's column-major storage of the equivalent column-vector matrix, so
//! [`mat_from_rows`] and [`mat_to_rows`] need no transposition.

pub use glam::{DMat4, DVec3, DVec4};

/// Build a transform from sixteen values in file (row) order.
#[inline]
pub fn mat_from_rows(vals: &[f64; 16]) -> DMat4 {
    DMat4::from_cols_array(vals)
}

/// Sixteen values in file (row) order.
#[inline]
pub fn mat_to_rows(mat: &DMat4) -> [f64; 16] {
    mat.to_cols_array()
}

/// Transform a Euclidean point.
#[inline]
pub fn xform_point(mat: &DMat4, p: [f64; 3]) -> [f64; 3] {
    mat.transform_point3(DVec3::from_array(p)).to_array()
}

/// Transform a direction (translation ignored).
#[inline]
pub fn xform_vector(mat: &DMat4, v: [f64; 3]) -> [f64; 3] {
    mat.transform_vector3(DVec3::from_array(v)).to_array()
}

/// Transform homogeneous coordinates `(x, y, z, w)`.
#[inline]
pub fn xform_homogeneous(mat: &DMat4, p: [f64; 4]) -> [f64; 4] {
    (*mat * DVec4::from_array(p)).to_array()
}

/// Transform a plane `a*x + b*y + c*z + d = 0` by the inverse transpose.
pub fn xform_plane(mat: &DMat4, pl: [f64; 4]) -> [f64; 4] {
    let inv_t = mat.inverse().transpose();
    let mut out = (inv_t * DVec4::from_array(pl)).to_array();
    let len = (out[0] * out[0] + out[1] * out[1] + out[2] * out[2]).sqrt();
    if len > 0.0 {
        out.iter_mut().for_each(|c| *c /= len);
    }
    out
}

/// Canonical real formatting: shortest text that parses back to the same
/// bits, always carrying a fraction or exponent so it never reads as an integer.
pub fn real_to_string(v: f64) -> String {
    format!("{:?}", v)
}

/// Parse a real number token. Accepts the usual scan forms (`1`, `1.`, `.5`, `1e-3`).
#[inline]
pub fn parse_real(text: &str) -> Option<f64> {
    text.parse::<f64>().ok()
}

/// Approximate equality used by structural comparisons.
#[inline]
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps * (1.0 + a.abs().max(b.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_to_string_roundtrip() {
        for v in [0.0, 1.0, -2.5, 1e-10, 123456789.125, std::f64::consts::PI, 1e300] {
            let s = real_to_string(v);
            assert_eq!(parse_real(&s), Some(v), "{s}");
        }
        assert_eq!(real_to_string(1.0), "1.0");
    }

    #[test]
    fn test_row_matrix_translation() {
        let mut rows = [0.0; 16];
        rows[0] = 1.0;
        rows[5] = 1.0;
        rows[10] = 1.0;
        rows[15] = 1.0;
        rows[12] = 5.0;
        rows[13] = -1.0;
        let m = mat_from_rows(&rows);
        assert_eq!(xform_point(&m, [1.0, 1.0, 1.0]), [6.0, 0.0, 1.0]);
        assert_eq!(xform_vector(&m, [1.0, 1.0, 1.0]), [1.0, 1.0, 1.0]);
        assert_eq!(mat_to_rows(&m), rows);
    }

    #[test]
    fn test_plane_scale() {
        let m = DMat4::from_scale(DVec3::splat(2.0));
        let pl = xform_plane(&m, [0.0, 0.0, 1.0, -1.0]);
        assert!(approx_eq(pl[2], 1.0, 1e-12));
        assert!(approx_eq(pl[3], -2.0, 1e-12));
    }
}
