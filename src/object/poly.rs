//! Polygon meshes, polylines and point lists.

use super::Attributes;
use crate::util::{approx_eq, xform_plane, xform_point, xform_vector, DMat4};

/// How the vertex lists of a [`PolyList`] are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolyKind {
    Polygon,
    Polyline,
    PointList,
}

impl PolyKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Polygon => "POLYGON",
            Self::Polyline => "POLYLINE",
            Self::PointList => "POINTLIST",
        }
    }

    pub fn to_code(self) -> u32 {
        match self {
            Self::Polygon => 0,
            Self::Polyline => 1,
            Self::PointList => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Polygon),
            1 => Some(Self::Polyline),
            2 => Some(Self::PointList),
            _ => None,
        }
    }
}

/// A mesh vertex.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Vertex {
    pub attrs: Attributes,
    pub coord: [f64; 3],
    pub normal: Option<[f64; 3]>,
    /// Edge from this vertex to the next is internal (not a boundary).
    pub internal: bool,
}

impl Vertex {
    pub fn new(coord: [f64; 3]) -> Self {
        Self { coord, ..Default::default() }
    }

    fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        let close = |a: &[f64; 3], b: &[f64; 3]| a.iter().zip(b).all(|(x, y)| approx_eq(*x, *y, eps));
        close(&self.coord, &other.coord)
            && self.internal == other.internal
            && match (&self.normal, &other.normal) {
                (Some(a), Some(b)) => close(a, b),
                (None, None) => true,
                _ => false,
            }
            && self.attrs.approx_eq(&other.attrs, eps)
    }
}

/// A polygon (or polyline, or point set) with its vertices.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Polygon {
    pub attrs: Attributes,
    pub plane: Option<[f64; 4]>,
    pub vertices: Vec<Vertex>,
    /// Vertex list forms a ring: the last vertex links back to the first.
    pub circular: bool,
}

impl Polygon {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices, ..Default::default() }
    }

    /// Polygon from bare coordinates.
    pub fn from_coords(coords: &[[f64; 3]]) -> Self {
        Self::new(coords.iter().copied().map(Vertex::new).collect())
    }

    /// Consecutive vertex pairs, including the closing edge of a ring.
    pub fn edges(&self) -> impl Iterator<Item = (&Vertex, &Vertex)> + '_ {
        let n = self.vertices.len();
        let count = if self.circular && n > 1 { n } else { n.saturating_sub(1) };
        (0..count).map(move |i| (&self.vertices[i], &self.vertices[(i + 1) % n]))
    }

    pub fn transform(&mut self, mat: &DMat4) {
        for v in &mut self.vertices {
            v.coord = xform_point(mat, v.coord);
            if let Some(n) = v.normal.as_mut() {
                let t = xform_vector(mat, *n);
                let len = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
                *n = if len > 0.0 { [t[0] / len, t[1] / len, t[2] / len] } else { t };
            }
        }
        if let Some(pl) = self.plane.as_mut() {
            *pl = xform_plane(mat, *pl);
        }
    }

    fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.vertices.len() == other.vertices.len()
            && match (&self.plane, &other.plane) {
                (Some(a), Some(b)) => a.iter().zip(b).all(|(x, y)| approx_eq(*x, *y, eps)),
                (None, None) => true,
                _ => false,
            }
            && self.attrs.approx_eq(&other.attrs, eps)
            && self.vertices.iter().zip(&other.vertices).all(|(a, b)| a.approx_eq(b, eps))
    }
}

/// The payload of a polygonal object.
#[derive(Clone, Debug, PartialEq)]
pub struct PolyList {
    pub kind: PolyKind,
    pub polys: Vec<Polygon>,
}

impl PolyList {
    pub fn new(kind: PolyKind, polys: Vec<Polygon>) -> Self {
        Self { kind, polys }
    }

    pub fn transform(&mut self, mat: &DMat4) {
        self.polys.iter_mut().for_each(|p| p.transform(mat));
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.kind == other.kind
            && self.polys.len() == other.polys.len()
            && self.polys.iter().zip(&other.polys).all(|(a, b)| a.approx_eq(b, eps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_edges() {
        let mut pl = Polygon::from_coords(&[[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(pl.edges().count(), 2);
        pl.circular = true;
        let edges: Vec<_> = pl.edges().map(|(a, b)| (a.coord[0], b.coord[0])).collect();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2], (0.0, 0.0));
    }

    #[test]
    fn test_transform_plane_and_normal() {
        let mut pl = Polygon::from_coords(&[[1.0, 0.0, 1.0]]);
        pl.plane = Some([0.0, 0.0, 1.0, -1.0]);
        pl.vertices[0].normal = Some([0.0, 0.0, 1.0]);
        pl.transform(&DMat4::from_scale(crate::util::DVec3::splat(3.0)));
        assert_eq!(pl.vertices[0].coord, [3.0, 0.0, 3.0]);
        assert_eq!(pl.vertices[0].normal, Some([0.0, 0.0, 1.0]));
        let plane = pl.plane.unwrap();
        assert!(approx_eq(plane[3], -3.0, 1e-12));
    }
}
