//! The geometric object model.
//!
//! An [`Object`] is a named, attributed node whose [`ObjectKind`] carries the
//! payload: leaf values (numbers, points, matrices, strings, control points),
//! instances, polygon meshes, chains of parametric geometry, or a list of
//! child objects. Children are owned, so a list can never contain itself.

mod attr;
mod cagd;
mod poly;
mod trim;

pub use attr::*;
pub use cagd::*;
pub use poly::*;
pub use trim::*;

use cagd::slices_approx_eq;

use crate::util::{approx_eq, xform_plane, xform_point, xform_vector, DMat4, Error, Result};

/// Kind tag of an object, as used by the binary format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjType {
    Undefined = 0,
    Poly = 1,
    Numeric = 2,
    Point = 3,
    Vector = 4,
    Plane = 5,
    CtlPt = 6,
    Matrix = 7,
    Instance = 8,
    String = 9,
    List = 10,
    Curve = 11,
    Surface = 12,
    TrimSrf = 13,
    Trivar = 14,
    TriSrf = 15,
    Model = 16,
    Multivar = 17,
}

impl ObjType {
    pub fn from_u32(code: u32) -> Option<Self> {
        use ObjType::*;
        Some(match code {
            0 => Undefined,
            1 => Poly,
            2 => Numeric,
            3 => Point,
            4 => Vector,
            5 => Plane,
            6 => CtlPt,
            7 => Matrix,
            8 => Instance,
            9 => String,
            10 => List,
            11 => Curve,
            12 => Surface,
            13 => TrimSrf,
            14 => Trivar,
            15 => TriSrf,
            16 => Model,
            17 => Multivar,
            _ => return None,
        })
    }

    /// Human readable name.
    pub fn name(&self) -> &'static str {
        use ObjType::*;
        match self {
            Undefined => "undefined",
            Poly => "polygons",
            Numeric => "numeric",
            Point => "point",
            Vector => "vector",
            Plane => "plane",
            CtlPt => "control point",
            Matrix => "matrix",
            Instance => "instance",
            String => "string",
            List => "list",
            Curve => "curve",
            Surface => "surface",
            TrimSrf => "trimmed surface",
            Trivar => "trivariate",
            TriSrf => "triangular surface",
            Model => "model",
            Multivar => "multivariate",
        }
    }
}

/// A single control point.
#[derive(Clone, Debug, PartialEq)]
pub struct CtlPt {
    pub point_type: PointType,
    /// `[w?, x, y, ...]`
    pub coords: Vec<f64>,
}

impl CtlPt {
    pub fn new(point_type: PointType, coords: Vec<f64>) -> Result<Self> {
        if coords.len() != point_type.coord_count() {
            return Err(Error::invalid(format!(
                "control point {} needs {} coordinates, got {}",
                point_type,
                point_type.coord_count(),
                coords.len()
            )));
        }
        Ok(Self { point_type, coords })
    }
}

/// A named reference to another object plus a transform.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub target: String,
    pub mat: DMat4,
}

/// Payload of an object.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum ObjectKind {
    #[default]
    Undefined,
    Poly(PolyList),
    Numeric(f64),
    Point([f64; 3]),
    Vector([f64; 3]),
    Plane([f64; 4]),
    CtlPt(CtlPt),
    Matrix(DMat4),
    Instance(Instance),
    String(String),
    List(Vec<Object>),
    Curve(Vec<Curve>),
    Surface(Vec<Surface>),
    TrimSrf(Vec<TrimSrf>),
    Trivar(Vec<Trivar>),
    TriSrf(Vec<TriSrf>),
    Model(Vec<Model>),
    Multivar(Vec<Multivar>),
}

impl ObjectKind {
    pub fn obj_type(&self) -> ObjType {
        match self {
            Self::Undefined => ObjType::Undefined,
            Self::Poly(_) => ObjType::Poly,
            Self::Numeric(_) => ObjType::Numeric,
            Self::Point(_) => ObjType::Point,
            Self::Vector(_) => ObjType::Vector,
            Self::Plane(_) => ObjType::Plane,
            Self::CtlPt(_) => ObjType::CtlPt,
            Self::Matrix(_) => ObjType::Matrix,
            Self::Instance(_) => ObjType::Instance,
            Self::String(_) => ObjType::String,
            Self::List(_) => ObjType::List,
            Self::Curve(_) => ObjType::Curve,
            Self::Surface(_) => ObjType::Surface,
            Self::TrimSrf(_) => ObjType::TrimSrf,
            Self::Trivar(_) => ObjType::Trivar,
            Self::TriSrf(_) => ObjType::TriSrf,
            Self::Model(_) => ObjType::Model,
            Self::Multivar(_) => ObjType::Multivar,
        }
    }
}

/// A node of the scene graph.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Object {
    pub name: Option<String>,
    pub attrs: Attributes,
    pub kind: ObjectKind,
}

impl Object {
    /// Anonymous object of the given kind.
    pub fn new(kind: ObjectKind) -> Self {
        Self { name: None, attrs: Attributes::new(), kind }
    }

    /// Builder-style name setter.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.set(name, value);
        self
    }

    pub fn list(children: Vec<Object>) -> Self {
        Self::new(ObjectKind::List(children))
    }

    pub fn curve(crv: Curve) -> Self {
        Self::new(ObjectKind::Curve(vec![crv]))
    }

    pub fn surface(srf: Surface) -> Self {
        Self::new(ObjectKind::Surface(vec![srf]))
    }

    pub fn polygons(polys: Vec<Polygon>) -> Self {
        Self::new(ObjectKind::Poly(PolyList::new(PolyKind::Polygon, polys)))
    }

    pub fn instance(target: impl Into<String>, mat: DMat4) -> Self {
        Self::new(ObjectKind::Instance(Instance { target: target.into(), mat }))
    }

    #[inline]
    pub fn obj_type(&self) -> ObjType {
        self.kind.obj_type()
    }

    /// Name, or empty string for anonymous objects.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    #[inline]
    pub fn is_list(&self) -> bool {
        matches!(self.kind, ObjectKind::List(_))
    }

    /// Children of a list object; empty for every other kind.
    pub fn children(&self) -> &[Object] {
        match &self.kind {
            ObjectKind::List(v) => v,
            _ => &[],
        }
    }

    /// Whether the object is freeform geometry (curves, surfaces, ...).
    pub fn is_freeform(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Curve(_)
                | ObjectKind::Surface(_)
                | ObjectKind::TrimSrf(_)
                | ObjectKind::Trivar(_)
                | ObjectKind::TriSrf(_)
                | ObjectKind::Model(_)
                | ObjectKind::Multivar(_)
        )
    }

    /// Whether the object was produced by instance resolution.
    pub fn is_instance_derived(&self) -> bool {
        self.attrs.contains(ATTR_INSTANCE)
    }

    /// Find a direct or nested child by exact name, depth first.
    pub fn find(&self, name: &str) -> Option<&Object> {
        if self.name.as_deref() == Some(name) {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(name))
    }

    /// Validate every geometric invariant in the subtree.
    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            ObjectKind::Curve(v) => v.iter().try_for_each(Curve::validate),
            ObjectKind::Surface(v) => v.iter().try_for_each(Surface::validate),
            ObjectKind::TrimSrf(v) => v.iter().try_for_each(TrimSrf::validate),
            ObjectKind::Trivar(v) => v.iter().try_for_each(Trivar::validate),
            ObjectKind::TriSrf(v) => v.iter().try_for_each(TriSrf::validate),
            ObjectKind::Model(v) => v.iter().try_for_each(Model::validate),
            ObjectKind::Multivar(v) => v.iter().try_for_each(Multivar::validate),
            ObjectKind::List(v) => v.iter().try_for_each(Object::validate),
            ObjectKind::CtlPt(c) => CtlPt::new(c.point_type, c.coords.clone()).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Transform the geometry of this subtree in place.
    pub fn transform(&mut self, mat: &DMat4) {
        match &mut self.kind {
            ObjectKind::Undefined | ObjectKind::Numeric(_) | ObjectKind::String(_) => {}
            ObjectKind::Poly(pl) => pl.transform(mat),
            ObjectKind::Point(p) => *p = xform_point(mat, *p),
            ObjectKind::Vector(v) => *v = xform_vector(mat, *v),
            ObjectKind::Plane(pl) => *pl = xform_plane(mat, *pl),
            ObjectKind::CtlPt(c) => {
                let mut mesh = ControlMesh::new(c.point_type, 1);
                if mesh.set_point(0, &c.coords).is_ok() {
                    mesh.transform(mat);
                    c.coords = mesh.point(0);
                }
            }
            ObjectKind::Matrix(m) => *m = *mat * *m,
            ObjectKind::Instance(inst) => inst.mat = *mat * inst.mat,
            ObjectKind::List(v) => v.iter_mut().for_each(|o| o.transform(mat)),
            ObjectKind::Curve(v) => v.iter_mut().for_each(|c| c.mesh.transform(mat)),
            ObjectKind::Surface(v) => v.iter_mut().for_each(|s| s.mesh.transform(mat)),
            ObjectKind::TrimSrf(v) => v.iter_mut().for_each(|t| t.transform(mat)),
            ObjectKind::Trivar(v) => v.iter_mut().for_each(|t| t.mesh.transform(mat)),
            ObjectKind::TriSrf(v) => v.iter_mut().for_each(|t| t.mesh.transform(mat)),
            ObjectKind::Model(v) => v.iter_mut().for_each(|m| m.transform(mat)),
            ObjectKind::Multivar(v) => v.iter_mut().for_each(|m| m.mesh.transform(mat)),
        }
    }

    /// Structural equality with a tolerance on reals.
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        fn chain<T>(a: &[T], b: &[T], f: impl Fn(&T, &T) -> bool) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| f(x, y))
        }
        let reals = |a: &[f64], b: &[f64]| slices_approx_eq(a, b, eps);

        if self.name != other.name || !self.attrs.approx_eq(&other.attrs, eps) {
            return false;
        }
        match (&self.kind, &other.kind) {
            (ObjectKind::Undefined, ObjectKind::Undefined) => true,
            (ObjectKind::Poly(a), ObjectKind::Poly(b)) => a.approx_eq(b, eps),
            (ObjectKind::Numeric(a), ObjectKind::Numeric(b)) => approx_eq(*a, *b, eps),
            (ObjectKind::Point(a), ObjectKind::Point(b))
            | (ObjectKind::Vector(a), ObjectKind::Vector(b)) => reals(&a[..], &b[..]),
            (ObjectKind::Plane(a), ObjectKind::Plane(b)) => reals(&a[..], &b[..]),
            (ObjectKind::CtlPt(a), ObjectKind::CtlPt(b)) => {
                a.point_type == b.point_type && reals(&a.coords, &b.coords)
            }
            (ObjectKind::Matrix(a), ObjectKind::Matrix(b)) => {
                reals(&a.to_cols_array()[..], &b.to_cols_array()[..])
            }
            (ObjectKind::Instance(a), ObjectKind::Instance(b)) => {
                a.target == b.target
                    && reals(&a.mat.to_cols_array()[..], &b.mat.to_cols_array()[..])
            }
            (ObjectKind::String(a), ObjectKind::String(b)) => a == b,
            (ObjectKind::List(a), ObjectKind::List(b)) => chain(a, b, |x, y| x.approx_eq(y, eps)),
            (ObjectKind::Curve(a), ObjectKind::Curve(b)) => chain(a, b, |x, y| x.approx_eq(y, eps)),
            (ObjectKind::Surface(a), ObjectKind::Surface(b)) => chain(a, b, |x, y| x.approx_eq(y, eps)),
            (ObjectKind::TrimSrf(a), ObjectKind::TrimSrf(b)) => chain(a, b, |x, y| x.approx_eq(y, eps)),
            (ObjectKind::Trivar(a), ObjectKind::Trivar(b)) => chain(a, b, |x, y| x.approx_eq(y, eps)),
            (ObjectKind::TriSrf(a), ObjectKind::TriSrf(b)) => chain(a, b, |x, y| x.approx_eq(y, eps)),
            (ObjectKind::Model(a), ObjectKind::Model(b)) => chain(a, b, |x, y| x.approx_eq(y, eps)),
            (ObjectKind::Multivar(a), ObjectKind::Multivar(b)) => chain(a, b, |x, y| x.approx_eq(y, eps)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::DVec3;

    #[test]
    fn test_obj_type_codes() {
        for code in 0..=17 {
            let t = ObjType::from_u32(code).unwrap();
            assert_eq!(t as u32, code);
        }
        assert_eq!(ObjType::from_u32(18), None);
        assert_eq!(ObjType::from_u32(201), None);
    }

    #[test]
    fn test_find_nested() {
        let leaf = Object::new(ObjectKind::Numeric(1.0)).with_name("n");
        let root = Object::list(vec![Object::list(vec![leaf]).with_name("inner")]);
        assert_eq!(root.find("n").map(|o| o.obj_type()), Some(ObjType::Numeric));
        assert!(root.find("missing").is_none());
    }

    #[test]
    fn test_transform_list() {
        let mut obj = Object::list(vec![
            Object::new(ObjectKind::Point([1.0, 2.0, 3.0])),
            Object::new(ObjectKind::Vector([1.0, 0.0, 0.0])),
        ]);
        obj.transform(&DMat4::from_translation(DVec3::new(1.0, 1.0, 1.0)));
        assert_eq!(obj.children()[0].kind, ObjectKind::Point([2.0, 3.0, 4.0]));
        assert_eq!(obj.children()[1].kind, ObjectKind::Vector([1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_approx_eq_checks_names_and_attrs() {
        let a = Object::new(ObjectKind::Numeric(1.0)).with_name("a").with_attr("color", 2);
        let mut b = a.clone();
        assert!(a.approx_eq(&b, 1e-9));
        b.attrs.set("color", 3);
        assert!(!a.approx_eq(&b, 1e-9));
        let c = a.clone().with_name("c");
        assert!(!a.approx_eq(&c, 1e-9));
    }
}
