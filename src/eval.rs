//! Curve evaluation.
//!
//! Evaluation is a collaborator of the persistence layer: readers and writers
//! never evaluate. [`BasisEvaluator`] is the plain implementation used by
//! [`Curve::eval`] and by the tests that check transforms and round trips.

use crate::object::{Curve, GeomType};
use crate::util::{Error, Result};

/// Evaluates curves at parameter values.
pub trait Evaluator {
    /// Euclidean point of the curve at `t`. Rational curves are projected.
    fn eval_curve(&self, crv: &Curve, t: f64) -> Result<Vec<f64>>;

    /// `n` points at uniformly spaced parameters over the whole domain.
    fn sample_curve(&self, crv: &Curve, n: usize) -> Result<Vec<Vec<f64>>> {
        let (t0, t1) = curve_domain(crv)?;
        match n {
            0 => Ok(Vec::new()),
            1 => Ok(vec![self.eval_curve(crv, t0)?]),
            _ => (0..n)
                .map(|i| self.eval_curve(crv, t0 + (t1 - t0) * i as f64 / (n - 1) as f64))
                .collect(),
        }
    }
}

/// Parameter domain: `[0, 1]` for Bezier and power curves, the active knot
/// span for B-splines.
pub fn curve_domain(crv: &Curve) -> Result<(f64, f64)> {
    match crv.geom_type {
        GeomType::Bezier | GeomType::Power => Ok((0.0, 1.0)),
        GeomType::Bspline => {
            let knots = crv.axis.knots.as_deref().ok_or_else(|| Error::invalid("B-spline curve without knots"))?;
            let last = if crv.axis.periodic { crv.axis.length + crv.axis.order - 1 } else { crv.axis.length };
            Ok((knots[crv.axis.order - 1], knots[last]))
        }
    }
}

/// De Casteljau for Bezier, de Boor for B-spline, Horner for power basis.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasisEvaluator;

impl BasisEvaluator {
    /// Homogeneous control points `[w?, x, y, ...]`; periodic curves repeat
    /// their first `order - 1` points.
    fn control_points(crv: &Curve) -> Vec<Vec<f64>> {
        let len = crv.length();
        let count = if crv.axis.periodic { len + crv.order() - 1 } else { len };
        (0..count).map(|i| crv.mesh.point(i % len)).collect()
    }

    fn de_casteljau(mut pts: Vec<Vec<f64>>, t: f64) -> Vec<f64> {
        let n = pts.len();
        for r in 1..n {
            for i in 0..n - r {
                pts[i] = lerp(&pts[i], &pts[i + 1], t);
            }
        }
        pts.swap_remove(0)
    }

    fn de_boor(pts: &[Vec<f64>], knots: &[f64], order: usize, t: f64) -> Vec<f64> {
        let p = order - 1;
        let n = pts.len();
        // Span k with knots[k] <= t < knots[k + 1], clamped to the domain
        let k = (p..n).rev().find(|&k| knots[k] <= t).unwrap_or(p);

        let mut d: Vec<Vec<f64>> = (0..=p).map(|j| pts[j + k - p].clone()).collect();
        for r in 1..=p {
            for j in (r..=p).rev() {
                let i = j + k - p;
                let denom = knots[i + order - r] - knots[i];
                let alpha = if denom == 0.0 { 0.0 } else { (t - knots[i]) / denom };
                d[j] = lerp(&d[j - 1], &d[j], alpha);
            }
        }
        d.swap_remove(p)
    }

    fn horner(pts: &[Vec<f64>], t: f64) -> Vec<f64> {
        let mut acc = vec![0.0; pts.first().map_or(0, Vec::len)];
        for c in pts.iter().rev() {
            for (a, v) in acc.iter_mut().zip(c) {
                *a = *a * t + v;
            }
        }
        acc
    }
}

fn lerp(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x * (1.0 - t) + y * t).collect()
}

impl Evaluator for BasisEvaluator {
    fn eval_curve(&self, crv: &Curve, t: f64) -> Result<Vec<f64>> {
        crv.validate()?;
        let pts = Self::control_points(crv);
        let h = match crv.geom_type {
            GeomType::Bezier => Self::de_casteljau(pts, t),
            GeomType::Power => Self::horner(&pts, t),
            GeomType::Bspline => {
                let knots = crv.axis.knots.as_deref().ok_or_else(|| Error::invalid("B-spline curve without knots"))?;
                Self::de_boor(&pts, knots, crv.order(), t)
            }
        };

        if crv.point_type().is_rational() {
            let w = h[0];
            if w == 0.0 {
                return Err(Error::invalid(format!("zero weight at t = {t}")));
            }
            Ok(h[1..].iter().map(|c| c / w).collect())
        } else {
            Ok(h)
        }
    }
}

impl Curve {
    /// Euclidean point at `t`.
    pub fn eval(&self, t: f64) -> Result<Vec<f64>> {
        BasisEvaluator.eval_curve(self, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::*;
    use crate::util::{approx_eq, DMat4};
    use glam::DVec3;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| approx_eq(*x, *y, 1e-12))
    }

    #[test]
    fn test_bezier() {
        let crv = Curve::bezier(PointType::E2, &[[0.0, 0.0], [1.0, 2.0], [2.0, 0.0]]).unwrap();
        assert!(close(&crv.eval(0.0).unwrap(), &[0.0, 0.0]));
        assert!(close(&crv.eval(0.5).unwrap(), &[1.0, 1.0]));
        assert!(close(&crv.eval(1.0).unwrap(), &[2.0, 0.0]));
    }

    #[test]
    fn test_clamped_bspline_hits_ends() {
        let pts = [[0.0, 0.0], [1.0, 1.0], [2.0, 0.0], [3.0, 1.0]];
        let axis = ParamAxis::bspline(4, 3, false, vec![0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0]).unwrap();
        let mesh = ControlMesh::from_points(PointType::E2, &pts).unwrap();
        let crv = Curve::new(GeomType::Bspline, axis, mesh).unwrap();

        assert_eq!(curve_domain(&crv).unwrap(), (0.0, 2.0));
        assert!(close(&crv.eval(0.0).unwrap(), &[0.0, 0.0]));
        assert!(close(&crv.eval(2.0).unwrap(), &[3.0, 1.0]));
        // t = 1 blends the middle points
        assert!(close(&crv.eval(1.0).unwrap(), &[1.5, 0.5]));
    }

    #[test]
    fn test_rational_arc() {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let crv = Curve::bezier(PointType::P2, &[[1.0, 1.0, 0.0], [w, w, w], [1.0, 0.0, 1.0]]).unwrap();
        for p in BasisEvaluator.sample_curve(&crv, 5).unwrap() {
            assert!(approx_eq(p[0].hypot(p[1]), 1.0, 1e-12));
        }
    }

    #[test]
    fn test_power_basis() {
        // 1 + 2t + 3t^2
        let mesh = ControlMesh::from_points(PointType::E1, &[[1.0], [2.0], [3.0]]).unwrap();
        let crv = Curve::new(GeomType::Power, ParamAxis::power(3), mesh).unwrap();
        assert!(close(&crv.eval(2.0).unwrap(), &[17.0]));
    }

    #[test]
    fn test_eval_commutes_with_transform() {
        let mut crv = Curve::bspline(3, PointType::E3, &[
            [0.0, 0.0, 0.0],
            [1.0, 2.0, 0.0],
            [2.0, 0.0, 1.0],
            [3.0, 1.0, 0.0],
        ])
        .unwrap();
        let mat = DMat4::from_translation(DVec3::new(1.0, -1.0, 2.0)) * DMat4::from_scale(DVec3::splat(2.0));
        let before = crv.eval(0.7).unwrap();
        crv.mesh.transform(&mat);
        let after = crv.eval(0.7).unwrap();
        let expected = crate::util::xform_point(&mat, [before[0], before[1], before[2]]);
        assert!(close(&after, &expected));
    }
}
