//! Parametric geometry: curves, surfaces, trivariates, multivariates and
//! triangular surfaces.
//!
//! Every entity pairs a control mesh with one [`ParamAxis`] per parametric
//! direction. The knot vector of an axis exists iff the entity is a B-spline
//! and its length is always `length + order (+ order - 1 if periodic)`.

use std::fmt;

use crate::util::{approx_eq, xform_homogeneous, DMat4, Error, Result};

/// Maximal Euclidean dimension of a control point.
pub const MAX_PT_COORD: usize = 9;

/// Number of coordinate slots in a control mesh (slot 0 is the weight).
pub const MAX_PT_SIZE: usize = MAX_PT_COORD + 1;

/// Rationality and Euclidean dimension of control points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PointType {
    rational: bool,
    dim: u8,
}

impl PointType {
    pub const E1: Self = Self { rational: false, dim: 1 };
    pub const E2: Self = Self { rational: false, dim: 2 };
    pub const E3: Self = Self { rational: false, dim: 3 };
    pub const P2: Self = Self { rational: true, dim: 2 };
    pub const P3: Self = Self { rational: true, dim: 3 };

    /// Create a point type, validating the dimension.
    pub fn new(rational: bool, dim: usize) -> Result<Self> {
        if dim == 0 || dim > MAX_PT_COORD {
            return Err(Error::invalid(format!(
                "point dimension {dim} outside 1..={MAX_PT_COORD}"
            )));
        }
        Ok(Self { rational, dim: dim as u8 })
    }

    /// Parse `E<d>` / `P<d>` (case-insensitive).
    pub fn parse(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let rational = match chars.next() {
            Some('E' | 'e') => false,
            Some('P' | 'p') => true,
            _ => return Err(Error::invalid(format!("bad point type '{text}', expected E<n> or P<n>"))),
        };
        let dim: usize = chars
            .as_str()
            .parse()
            .map_err(|_| Error::invalid(format!("bad point type '{text}'")))?;
        Self::new(rational, dim)
    }

    #[inline]
    pub fn is_rational(&self) -> bool {
        self.rational
    }

    /// Euclidean dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim as usize
    }

    /// Number of stored coordinates per point (weight included).
    #[inline]
    pub fn coord_count(&self) -> usize {
        self.dim as usize + self.rational as usize
    }

    /// First populated slot of a control mesh.
    #[inline]
    pub fn first_slot(&self) -> usize {
        if self.rational { 0 } else { 1 }
    }

    /// Binary code: dimension in the low byte, rational flag in bit 8.
    #[inline]
    pub fn to_code(self) -> u32 {
        self.dim as u32 | ((self.rational as u32) << 8)
    }

    pub fn from_code(code: u32) -> Result<Self> {
        Self::new(code & 0x100 != 0, (code & 0xFF) as usize)
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.rational { 'P' } else { 'E' }, self.dim)
    }
}

/// Basis of a parametric entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeomType {
    Bezier,
    Bspline,
    Power,
}

impl GeomType {
    /// Keyword used by the text format.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Bezier => "BEZIER",
            Self::Bspline => "BSPLINE",
            Self::Power => "POWER",
        }
    }

    pub fn to_code(self) -> u32 {
        match self {
            Self::Bezier => 1,
            Self::Bspline => 2,
            Self::Power => 3,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(Self::Bezier),
            2 => Ok(Self::Bspline),
            3 => Ok(Self::Power),
            _ => Err(Error::invalid(format!("unknown geometry type code {code}"))),
        }
    }
}

/// Required knot vector length for an axis.
#[inline]
pub fn knot_vector_len(length: usize, order: usize, periodic: bool) -> usize {
    let extra = if periodic { order.saturating_sub(1) } else { 0 };
    length.saturating_add(order).saturating_add(extra)
}

/// One parametric direction.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamAxis {
    pub length: usize,
    pub order: usize,
    pub periodic: bool,
    pub knots: Option<Vec<f64>>,
}

impl ParamAxis {
    /// Bezier axis: order equals length.
    pub fn bezier(length: usize) -> Self {
        Self { length, order: length, periodic: false, knots: None }
    }

    /// Power basis axis: order equals length.
    pub fn power(length: usize) -> Self {
        Self { length, order: length, periodic: false, knots: None }
    }

    /// B-spline axis with an explicit knot vector.
    pub fn bspline(length: usize, order: usize, periodic: bool, knots: Vec<f64>) -> Result<Self> {
        let axis = Self { length, order, periodic, knots: Some(knots) };
        axis.validate(GeomType::Bspline)?;
        Ok(axis)
    }

    /// B-spline axis with a uniform open (clamped) knot vector.
    pub fn bspline_open(length: usize, order: usize) -> Result<Self> {
        if order == 0 || order > length {
            return Err(Error::invalid(format!("order {order} invalid for length {length}")));
        }
        let interior = length - order;
        let mut knots = Vec::with_capacity(length + order);
        knots.extend(std::iter::repeat(0.0).take(order));
        knots.extend((1..=interior).map(|i| i as f64));
        knots.extend(std::iter::repeat((interior + 1) as f64).take(order));
        Self::bspline(length, order, false, knots)
    }

    /// Expected knot count for this axis.
    #[inline]
    pub fn knot_len(&self) -> usize {
        knot_vector_len(self.length, self.order, self.periodic)
    }

    /// Check the axis against the entity basis.
    pub fn validate(&self, geom_type: GeomType) -> Result<()> {
        if self.length == 0 || self.order == 0 {
            return Err(Error::invalid("zero length or order"));
        }
        match geom_type {
            GeomType::Bezier | GeomType::Power => {
                if self.order != self.length {
                    return Err(Error::invalid(format!(
                        "{} axis with order {} != length {}",
                        geom_type.keyword(), self.order, self.length
                    )));
                }
                if self.knots.is_some() || self.periodic {
                    return Err(Error::invalid(format!(
                        "{} axis cannot carry a knot vector",
                        geom_type.keyword()
                    )));
                }
            }
            GeomType::Bspline => {
                if !self.periodic && self.order > self.length {
                    return Err(Error::invalid(format!(
                        "B-spline order {} exceeds length {}",
                        self.order, self.length
                    )));
                }
                let knots = self
                    .knots
                    .as_ref()
                    .ok_or_else(|| Error::invalid("B-spline axis without knot vector"))?;
                if knots.len() != self.knot_len() {
                    return Err(Error::invalid(format!(
                        "knot vector has {} values, expected {}",
                        knots.len(),
                        self.knot_len()
                    )));
                }
            }
        }
        Ok(())
    }

    fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.length == other.length
            && self.order == other.order
            && self.periodic == other.periodic
            && match (&self.knots, &other.knots) {
                (Some(a), Some(b)) => slices_approx_eq(a, b, eps),
                (None, None) => true,
                _ => false,
            }
    }
}

/// Control points stored per coordinate.
///
/// Slot 0 holds the weights and is present iff the point type is rational;
/// slots `1..=dim` are present; every other slot is `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlMesh {
    pub point_type: PointType,
    pub coords: [Option<Vec<f64>>; MAX_PT_SIZE],
}

impl ControlMesh {
    /// Mesh of `count` zeroed points (weights set to one).
    pub fn new(point_type: PointType, count: usize) -> Self {
        let mut coords: [Option<Vec<f64>>; MAX_PT_SIZE] = Default::default();
        for (slot, c) in coords.iter_mut().enumerate() {
            if slot == 0 && point_type.is_rational() {
                *c = Some(vec![1.0; count]);
            } else if slot >= 1 && slot <= point_type.dim() {
                *c = Some(vec![0.0; count]);
            }
        }
        Self { point_type, coords }
    }

    /// Mesh with every used slot empty, ready for [`push_point`](Self::push_point).
    pub fn with_capacity(point_type: PointType, capacity: usize) -> Self {
        let mut coords: [Option<Vec<f64>>; MAX_PT_SIZE] = Default::default();
        for slot in point_type.first_slot()..=point_type.dim() {
            coords[slot] = Some(Vec::with_capacity(capacity));
        }
        Self { point_type, coords }
    }

    /// Build from points given as `[w?, x, y, ...]` rows.
    pub fn from_points<P: AsRef<[f64]>>(point_type: PointType, points: &[P]) -> Result<Self> {
        let mut mesh = Self::new(point_type, points.len());
        for (i, p) in points.iter().enumerate() {
            mesh.set_point(i, p.as_ref())?;
        }
        Ok(mesh)
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.coords
            .iter()
            .flatten()
            .next()
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots that carry data, in storage order.
    pub fn slots(&self) -> std::ops::RangeInclusive<usize> {
        self.point_type.first_slot()..=self.point_type.dim()
    }

    /// Point `i` as `[w?, x, y, ...]`.
    pub fn point(&self, i: usize) -> Vec<f64> {
        self.slots()
            .filter_map(|s| self.coords[s].as_ref().map(|c| c[i]))
            .collect()
    }

    /// Overwrite point `i` from `[w?, x, y, ...]`.
    pub fn set_point(&mut self, i: usize, p: &[f64]) -> Result<()> {
        if p.len() != self.point_type.coord_count() {
            return Err(Error::invalid(format!(
                "point has {} coordinates, {} expects {}",
                p.len(),
                self.point_type,
                self.point_type.coord_count()
            )));
        }
        for (s, v) in self.slots().zip(p) {
            if let Some(c) = self.coords[s].as_mut() {
                c[i] = *v;
            }
        }
        Ok(())
    }

    /// Append a point given as `[w?, x, y, ...]`.
    pub fn push_point(&mut self, p: &[f64]) -> Result<()> {
        if p.len() != self.point_type.coord_count() {
            return Err(Error::invalid(format!(
                "point has {} coordinates, {} expects {}",
                p.len(),
                self.point_type,
                self.point_type.coord_count()
            )));
        }
        for (s, v) in self.slots().zip(p) {
            if let Some(c) = self.coords[s].as_mut() {
                c.push(*v);
            }
        }
        Ok(())
    }

    /// Check slot population and per-slot counts.
    pub fn validate(&self, count: usize) -> Result<()> {
        for (slot, c) in self.coords.iter().enumerate() {
            let expected = self.slots().contains(&slot);
            match c {
                Some(_) if !expected => {
                    return Err(Error::invalid(format!("coordinate slot {slot} unused by {}", self.point_type)));
                }
                Some(v) if v.len() != count => {
                    return Err(Error::invalid(format!(
                        "coordinate slot {slot} has {} points, expected {count}",
                        v.len()
                    )));
                }
                None if expected => {
                    return Err(Error::invalid(format!("coordinate slot {slot} missing for {}", self.point_type)));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply a transform to every point. Rational points are transformed as
    /// homogeneous coordinates; coordinates beyond the third are untouched.
    pub fn transform(&mut self, mat: &DMat4) {
        let dim = self.point_type.dim().min(3);
        for i in 0..self.len() {
            let w = self.coords[0].as_ref().map_or(1.0, |c| c[i]);
            let mut h = [0.0, 0.0, 0.0, w];
            for (k, slot) in h.iter_mut().take(dim).enumerate() {
                if let Some(c) = &self.coords[k + 1] {
                    *slot = c[i];
                }
            }
            let out = xform_homogeneous(mat, h);
            for (k, value) in out.iter().take(dim).enumerate() {
                if let Some(c) = self.coords[k + 1].as_mut() {
                    c[i] = *value;
                }
            }
            if let Some(c) = self.coords[0].as_mut() {
                c[i] = out[3];
            }
        }
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.point_type == other.point_type
            && self.coords.iter().zip(&other.coords).all(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => slices_approx_eq(a, b, eps),
                (None, None) => true,
                _ => false,
            })
    }
}

pub(crate) fn slices_approx_eq(a: &[f64], b: &[f64], eps: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| approx_eq(*x, *y, eps))
}

fn validate_entity(geom_type: GeomType, axes: &[ParamAxis], mesh: &ControlMesh) -> Result<()> {
    for axis in axes {
        axis.validate(geom_type)?;
    }
    let count = axes
        .iter()
        .try_fold(1usize, |acc, a| acc.checked_mul(a.length))
        .ok_or_else(|| Error::invalid("control mesh size overflows"))?;
    mesh.validate(count)
}

/// Parametric curve.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    pub geom_type: GeomType,
    pub axis: ParamAxis,
    pub mesh: ControlMesh,
}

impl Curve {
    /// Validated constructor.
    pub fn new(geom_type: GeomType, axis: ParamAxis, mesh: ControlMesh) -> Result<Self> {
        let crv = Self { geom_type, axis, mesh };
        crv.validate()?;
        Ok(crv)
    }

    /// Bezier curve through the given control points.
    pub fn bezier<P: AsRef<[f64]>>(point_type: PointType, points: &[P]) -> Result<Self> {
        let mesh = ControlMesh::from_points(point_type, points)?;
        Self::new(GeomType::Bezier, ParamAxis::bezier(points.len()), mesh)
    }

    /// Open B-spline curve with a uniform clamped knot vector.
    pub fn bspline<P: AsRef<[f64]>>(order: usize, point_type: PointType, points: &[P]) -> Result<Self> {
        let mesh = ControlMesh::from_points(point_type, points)?;
        Self::new(GeomType::Bspline, ParamAxis::bspline_open(points.len(), order)?, mesh)
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.axis.length
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.axis.order
    }

    #[inline]
    pub fn point_type(&self) -> PointType {
        self.mesh.point_type
    }

    pub fn validate(&self) -> Result<()> {
        validate_entity(self.geom_type, std::slice::from_ref(&self.axis), &self.mesh)
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.geom_type == other.geom_type
            && self.axis.approx_eq(&other.axis, eps)
            && self.mesh.approx_eq(&other.mesh, eps)
    }
}

/// Tensor product surface. Points are stored with u varying fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pub geom_type: GeomType,
    pub axes: [ParamAxis; 2],
    pub mesh: ControlMesh,
}

impl Surface {
    pub fn new(geom_type: GeomType, axes: [ParamAxis; 2], mesh: ControlMesh) -> Result<Self> {
        let srf = Self { geom_type, axes, mesh };
        srf.validate()?;
        Ok(srf)
    }

    /// Bezier patch from points in u-fastest order.
    pub fn bezier<P: AsRef<[f64]>>(
        u_len: usize,
        v_len: usize,
        point_type: PointType,
        points: &[P],
    ) -> Result<Self> {
        let mesh = ControlMesh::from_points(point_type, points)?;
        Self::new(GeomType::Bezier, [ParamAxis::bezier(u_len), ParamAxis::bezier(v_len)], mesh)
    }

    pub fn point_type(&self) -> PointType {
        self.mesh.point_type
    }

    pub fn validate(&self) -> Result<()> {
        validate_entity(self.geom_type, &self.axes, &self.mesh)
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.geom_type == other.geom_type
            && self.axes.iter().zip(&other.axes).all(|(a, b)| a.approx_eq(b, eps))
            && self.mesh.approx_eq(&other.mesh, eps)
    }
}

/// Trivariate volume.
#[derive(Clone, Debug, PartialEq)]
pub struct Trivar {
    pub geom_type: GeomType,
    pub axes: [ParamAxis; 3],
    pub mesh: ControlMesh,
}

impl Trivar {
    pub fn new(geom_type: GeomType, axes: [ParamAxis; 3], mesh: ControlMesh) -> Result<Self> {
        let tv = Self { geom_type, axes, mesh };
        tv.validate()?;
        Ok(tv)
    }

    pub fn validate(&self) -> Result<()> {
        validate_entity(self.geom_type, &self.axes, &self.mesh)
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.geom_type == other.geom_type
            && self.axes.iter().zip(&other.axes).all(|(a, b)| a.approx_eq(b, eps))
            && self.mesh.approx_eq(&other.mesh, eps)
    }
}

/// Multivariate with an arbitrary number of parametric directions.
#[derive(Clone, Debug, PartialEq)]
pub struct Multivar {
    pub geom_type: GeomType,
    pub axes: Vec<ParamAxis>,
    pub mesh: ControlMesh,
}

impl Multivar {
    pub fn new(geom_type: GeomType, axes: Vec<ParamAxis>, mesh: ControlMesh) -> Result<Self> {
        let mv = Self { geom_type, axes, mesh };
        mv.validate()?;
        Ok(mv)
    }

    /// Number of parametric directions.
    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.axes.is_empty() {
            return Err(Error::invalid("multivariate without parametric directions"));
        }
        validate_entity(self.geom_type, &self.axes, &self.mesh)
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.geom_type == other.geom_type
            && self.axes.len() == other.axes.len()
            && self.axes.iter().zip(&other.axes).all(|(a, b)| a.approx_eq(b, eps))
            && self.mesh.approx_eq(&other.mesh, eps)
    }
}

/// Triangular surface; the mesh holds `length * (length + 1) / 2` points.
#[derive(Clone, Debug, PartialEq)]
pub struct TriSrf {
    pub geom_type: GeomType,
    pub length: usize,
    pub order: usize,
    pub knots: Option<Vec<f64>>,
    pub mesh: ControlMesh,
}

impl TriSrf {
    pub fn new(
        geom_type: GeomType,
        length: usize,
        order: usize,
        knots: Option<Vec<f64>>,
        mesh: ControlMesh,
    ) -> Result<Self> {
        let ts = Self { geom_type, length, order, knots, mesh };
        ts.validate()?;
        Ok(ts)
    }

    /// Control point count for a triangular mesh of the given side length.
    #[inline]
    pub fn mesh_size(length: usize) -> usize {
        length * (length + 1) / 2
    }

    /// [`mesh_size`](Self::mesh_size) for untrusted lengths.
    pub fn checked_mesh_size(length: usize) -> Result<usize> {
        length
            .checked_add(1)
            .and_then(|n| n.checked_mul(length))
            .map(|n| n / 2)
            .ok_or_else(|| Error::invalid(format!("triangular mesh of length {length} too large")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.length == 0 || self.order == 0 {
            return Err(Error::invalid("zero length or order"));
        }
        match self.geom_type {
            GeomType::Bezier => {
                if self.order != self.length || self.knots.is_some() {
                    return Err(Error::invalid("Bezier triangular surface needs order == length and no knots"));
                }
            }
            GeomType::Bspline => {
                let expected = self.length.saturating_add(self.order);
                match &self.knots {
                    Some(k) if k.len() == expected => {}
                    Some(k) => {
                        return Err(Error::invalid(format!(
                            "knot vector has {} values, expected {expected}",
                            k.len()
                        )))
                    }
                    None => return Err(Error::invalid("B-spline triangular surface without knot vector")),
                }
            }
            GeomType::Power => return Err(Error::invalid("power basis triangular surfaces are not supported")),
        }
        self.mesh.validate(Self::checked_mesh_size(self.length)?)
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.geom_type == other.geom_type
            && self.length == other.length
            && self.order == other.order
            && match (&self.knots, &other.knots) {
                (Some(a), Some(b)) => slices_approx_eq(a, b, eps),
                (None, None) => true,
                _ => false,
            }
            && self.mesh.approx_eq(&other.mesh, eps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_type_parse() {
        assert_eq!(PointType::parse("E2").unwrap(), PointType::E2);
        assert_eq!(PointType::parse("p3").unwrap(), PointType::P3);
        assert_eq!(PointType::P3.coord_count(), 4);
        assert!(PointType::parse("E0").is_err());
        assert!(PointType::parse("E10").is_err());
        assert!(PointType::parse("X3").is_err());
        assert_eq!(PointType::from_code(PointType::P2.to_code()).unwrap(), PointType::P2);
        assert_eq!(PointType::P2.to_string(), "P2");
    }

    #[test]
    fn test_knot_vector_length() {
        assert_eq!(knot_vector_len(4, 3, false), 7);
        assert_eq!(knot_vector_len(4, 3, true), 9);

        let axis = ParamAxis::bspline_open(4, 3).unwrap();
        assert_eq!(axis.knots.as_deref(), Some(&[0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0][..]));

        let short = ParamAxis::bspline(4, 3, false, vec![0.0; 6]);
        assert!(short.is_err());
        let periodic = ParamAxis::bspline(4, 3, true, (0..9).map(|i| i as f64).collect());
        assert!(periodic.is_ok());
    }

    #[test]
    fn test_mesh_slots() {
        let mesh = ControlMesh::from_points(PointType::P2, &[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0]]).unwrap();
        assert_eq!(mesh.len(), 2);
        assert!(mesh.coords[0].is_some());
        assert!(mesh.coords[3].is_none());
        assert_eq!(mesh.point(1), vec![2.0, 4.0, 6.0]);
        mesh.validate(2).unwrap();
        assert!(mesh.validate(3).is_err());

        let e2 = ControlMesh::new(PointType::E2, 3);
        assert!(e2.coords[0].is_none());
        assert!(e2.coords[2].is_some());
    }

    #[test]
    fn test_bezier_invariants() {
        let crv = Curve::bezier(PointType::E2, &[[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]).unwrap();
        assert_eq!(crv.order(), 3);
        assert!(crv.axis.knots.is_none());

        let mut bad = crv.clone();
        bad.axis.knots = Some(vec![0.0; 6]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_rational_transform_keeps_projection() {
        let mut mesh = ControlMesh::from_points(PointType::P2, &[[2.0, 2.0, 4.0]]).unwrap();
        mesh.transform(&DMat4::from_translation(crate::util::DVec3::new(1.0, 0.0, 0.0)));
        let p = mesh.point(0);
        assert_eq!(p[0], 2.0);
        assert_eq!(p[1] / p[0], 2.0);
        assert_eq!(p[2] / p[0], 2.0);
    }

    #[test]
    fn test_pushed_points_match_set_points() {
        let rows = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0]];
        let mut mesh = ControlMesh::with_capacity(PointType::P2, 1);
        for p in &rows {
            mesh.push_point(p).unwrap();
        }
        assert_eq!(mesh, ControlMesh::from_points(PointType::P2, &rows).unwrap());
        assert!(mesh.push_point(&[1.0, 2.0]).is_err());
        assert_eq!(mesh.len(), 2);
    }

    #[test]
    fn test_huge_axes_fail_validation() {
        let mesh = ControlMesh::from_points(PointType::E1, &[[0.0]]).unwrap();
        let axes = vec![ParamAxis::bezier(1 << 40), ParamAxis::bezier(1 << 40)];
        assert!(Multivar::new(GeomType::Bezier, axes, mesh.clone()).is_err());

        let axis = ParamAxis { length: usize::MAX, order: usize::MAX, periodic: true, knots: Some(vec![0.0]) };
        assert!(Curve::new(GeomType::Bspline, axis, mesh.clone()).is_err());

        assert!(TriSrf::checked_mesh_size(usize::MAX).is_err());
        assert!(TriSrf::new(GeomType::Bezier, usize::MAX, usize::MAX, None, mesh).is_err());
    }

    #[test]
    fn test_trisrf_sizes() {
        let mesh = ControlMesh::new(PointType::E3, TriSrf::mesh_size(3));
        let ts = TriSrf::new(GeomType::Bezier, 3, 3, None, mesh.clone()).unwrap();
        assert_eq!(ts.mesh.len(), 6);
        assert!(TriSrf::new(GeomType::Power, 3, 3, None, mesh).is_err());
    }
}
