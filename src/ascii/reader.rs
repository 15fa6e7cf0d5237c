//! Recursive descent reader for the text format.
//!
//! Every `read_*` sub-reader starts right after its `[KEYWORD` opening and
//! consumes the matching `]`. Geometry is built through the validating
//! constructors, so a curve that reaches the caller satisfies its knot and
//! mesh invariants. On error the partially built value is dropped on the way
//! out and only the error, carrying the current line, escapes.

use crate::lexer::{next_token, unget_token, Keyword, Token, TokenKind};
use crate::object::*;
use crate::stream::Stream;
use crate::util::{mat_from_rows, parse_real, Error, Result, MAX_PREALLOC};

/// Text reader over one open stream.
pub struct AsciiReader<'a> {
    stream: &'a mut Stream,
    circular: bool,
}

impl<'a> AsciiReader<'a> {
    pub fn new(stream: &'a mut Stream) -> Self {
        Self { stream, circular: false }
    }

    /// Close polygon vertex lists into rings.
    pub fn with_circular(mut self, circular: bool) -> Self {
        self.circular = circular;
        self
    }

    /// Current line of the underlying stream.
    #[inline]
    pub fn line(&self) -> u32 {
        self.stream.line()
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    #[inline]
    fn next(&mut self) -> Result<Token> {
        next_token(self.stream)
    }

    #[inline]
    fn unget(&mut self, tok: Token) -> Result<()> {
        unget_token(self.stream, tok)
    }

    fn syntax(&self, msg: impl Into<String>) -> Error {
        Error::syntax(self.line(), msg)
    }

    fn unexpected(&self, tok: &Token, wanted: &str) -> Error {
        self.syntax(format!("expected {wanted}, found {tok}"))
    }

    /// Attach the current line to a position-less semantic error.
    fn located(&self, err: Error) -> Error {
        match err {
            Error::Semantic { line: None, msg } => Error::Semantic { line: Some(self.line()), msg },
            e => e,
        }
    }

    fn expect_open(&mut self, what: &str) -> Result<()> {
        let tok = self.next()?;
        if tok.is(TokenKind::OpenBracket) {
            Ok(())
        } else {
            Err(self.unexpected(&tok, &format!("'[' starting {what}")))
        }
    }

    fn expect_close(&mut self, what: &str) -> Result<()> {
        let tok = self.next()?;
        if tok.is(TokenKind::CloseBracket) {
            Ok(())
        } else {
            Err(self.unexpected(&tok, &format!("']' closing {what}")))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword, what: &str) -> Result<()> {
        let tok = self.next()?;
        if tok.keyword() == Some(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&tok, what))
        }
    }

    fn real(&mut self, what: &str) -> Result<f64> {
        let tok = self.next()?;
        if tok.is(TokenKind::Other) {
            if let Some(v) = parse_real(&tok.text) {
                return Ok(v);
            }
        }
        Err(self.unexpected(&tok, what))
    }

    fn reals<const N: usize>(&mut self, what: &str) -> Result<[f64; N]> {
        let mut out = [0.0; N];
        for v in out.iter_mut() {
            *v = self.real(what)?;
        }
        Ok(out)
    }

    fn int(&mut self, what: &str) -> Result<i32> {
        let tok = self.next()?;
        if tok.is(TokenKind::Other) {
            if let Ok(v) = tok.text.parse::<i32>() {
                return Ok(v);
            }
        }
        Err(self.unexpected(&tok, what))
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let line = self.line();
        let v = self.int(what)?;
        usize::try_from(v).map_err(|_| Error::semantic(line, format!("negative {what} {v}")))
    }

    fn point_type(&mut self) -> Result<PointType> {
        let tok = self.next()?;
        if !tok.is_text() {
            return Err(self.unexpected(&tok, "point type"));
        }
        PointType::parse(&tok.text).map_err(|e| self.located(e))
    }

    fn geom_type(&mut self) -> Result<GeomType> {
        let tok = self.next()?;
        match tok.keyword() {
            Some(Keyword::Bezier) => Ok(GeomType::Bezier),
            Some(Keyword::Bspline) => Ok(GeomType::Bspline),
            Some(Keyword::Power) => Ok(GeomType::Power),
            _ => Err(self.unexpected(&tok, "BEZIER, BSPLINE or POWER")),
        }
    }

    /// Optional grouping bracket after the geometry type.
    fn open_group(&mut self) -> Result<bool> {
        let tok = self.next()?;
        if tok.is(TokenKind::OpenBracket) {
            return Ok(true);
        }
        self.unget(tok)?;
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    /// Read every top-level form up to end of input into a list object.
    pub fn read_all(&mut self) -> Result<Object> {
        let mut children = Vec::new();
        while let Some(obj) = self.read_next()? {
            children.push(obj);
        }
        tracing::debug!("read {} top-level objects", children.len());
        Ok(Object::list(children))
    }

    /// Read the next top-level form, `None` at end of input.
    pub fn read_next(&mut self) -> Result<Option<Object>> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::Eof => Ok(None),
            TokenKind::OpenBracket => self.read_form().map(Some),
            _ => Err(self.unexpected(&tok, "'[' starting an object")),
        }
    }

    /// A form positioned after its `[`: a full `OBJECT` or bare geometry.
    pub fn read_form(&mut self) -> Result<Object> {
        let head = self.next()?;
        match head.keyword() {
            Some(Keyword::Object) => self.read_object(),
            Some(kw) if kw.is_form() => {
                let mut kind = None;
                self.read_body_form(&mut kind, kw)?;
                Ok(Object::new(kind.unwrap_or_default()))
            }
            _ => Err(self.unexpected(&head, "OBJECT or a geometry keyword")),
        }
    }

    /// An `OBJECT` form positioned after the keyword.
    pub fn read_object(&mut self) -> Result<Object> {
        let mut name = None;
        let mut attrs = Attributes::new();
        let mut kind: Option<ObjectKind> = None;

        loop {
            let tok = self.next()?;
            match tok.kind {
                TokenKind::CloseBracket => break,
                TokenKind::OpenBracket => {
                    let head = self.next()?;
                    match head.keyword() {
                        Some(kw) if kw.is_form() => self.read_body_form(&mut kind, kw)?,
                        _ if head.is_text() => {
                            let (n, v) = self.read_attr(head)?;
                            attrs.set(n, v);
                        }
                        _ => return Err(self.unexpected(&head, "attribute name or object body")),
                    }
                }
                TokenKind::Eof => return Err(self.syntax("unexpected end of file inside OBJECT")),
                _ if name.is_none() && kind.is_none() => name = Some(tok.text),
                _ => return Err(self.unexpected(&tok, "'[' or ']'")),
            }
        }

        // An object without body is an empty list.
        let kind = kind.unwrap_or(ObjectKind::List(Vec::new()));
        Ok(Object { name, attrs, kind })
    }

    /// Read one body form and merge it into the object's payload.
    fn read_body_form(&mut self, acc: &mut Option<ObjectKind>, kw: Keyword) -> Result<()> {
        macro_rules! chain {
            ($variant:ident, $value:expr) => {{
                let v = $value;
                match *acc {
                    None => *acc = Some(ObjectKind::$variant(vec![v])),
                    Some(ObjectKind::$variant(ref mut items)) => items.push(v),
                    Some(ref other) => return Err(self.mixed(other.obj_type(), ObjType::$variant)),
                }
            }};
        }

        match kw {
            Keyword::Object => chain!(List, self.read_object()?),
            Keyword::Curve => chain!(Curve, self.read_curve()?),
            Keyword::Surface => chain!(Surface, self.read_surface()?),
            Keyword::TrimSrf => chain!(TrimSrf, self.read_trimsrf()?),
            Keyword::Trivar => chain!(Trivar, self.read_trivar()?),
            Keyword::TriSrf => chain!(TriSrf, self.read_trisrf()?),
            Keyword::Model => chain!(Model, self.read_model()?),
            Keyword::Multivar => chain!(Multivar, self.read_multivar()?),
            Keyword::Polygon | Keyword::Polyline | Keyword::PointList => {
                let pkind = match kw {
                    Keyword::Polygon => PolyKind::Polygon,
                    Keyword::Polyline => PolyKind::Polyline,
                    _ => PolyKind::PointList,
                };
                let poly = self.read_poly(pkind)?;
                match *acc {
                    None => *acc = Some(ObjectKind::Poly(PolyList::new(pkind, vec![poly]))),
                    Some(ObjectKind::Poly(ref mut pl)) if pl.kind == pkind => pl.polys.push(poly),
                    Some(ref other) => return Err(self.mixed(other.obj_type(), ObjType::Poly)),
                }
            }
            _ => {
                let leaf = self.read_leaf(kw)?;
                if let Some(other) = acc.as_ref() {
                    return Err(self.mixed(other.obj_type(), leaf.obj_type()));
                }
                *acc = Some(leaf);
            }
        }
        Ok(())
    }

    fn mixed(&self, have: ObjType, got: ObjType) -> Error {
        self.syntax(format!("object mixes {} and {} bodies", have.name(), got.name()))
    }

    /// Leaf body positioned after its keyword.
    fn read_leaf(&mut self, kw: Keyword) -> Result<ObjectKind> {
        let kind = match kw {
            Keyword::Number => ObjectKind::Numeric(self.real("number")?),
            Keyword::String => {
                let tok = self.next()?;
                if !matches!(tok.kind, TokenKind::Quoted | TokenKind::Other) {
                    return Err(self.unexpected(&tok, "string"));
                }
                ObjectKind::String(tok.text)
            }
            Keyword::Point => ObjectKind::Point(self.reals::<3>("point coordinate")?),
            Keyword::Vector => ObjectKind::Vector(self.reals::<3>("vector coordinate")?),
            Keyword::Plane => ObjectKind::Plane(self.reals::<4>("plane coefficient")?),
            Keyword::CtlPt => {
                let pt = self.point_type()?;
                let coords = (0..pt.coord_count())
                    .map(|_| self.real("control point coordinate"))
                    .collect::<Result<Vec<_>>>()?;
                ObjectKind::CtlPt(CtlPt::new(pt, coords).map_err(|e| self.located(e))?)
            }
            Keyword::Matrix => ObjectKind::Matrix(mat_from_rows(&self.reals::<16>("matrix entry")?)),
            Keyword::Instance => {
                let tok = self.next()?;
                if !tok.is_text() {
                    return Err(self.unexpected(&tok, "instance target name"));
                }
                let mat = mat_from_rows(&self.reals::<16>("matrix entry")?);
                ObjectKind::Instance(Instance { target: tok.text, mat })
            }
            _ => return Err(self.syntax(format!("unexpected keyword {kw:?} in object body"))),
        };
        self.expect_close(&format!("{} form", kind.obj_type().name()))?;
        Ok(kind)
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Attribute positioned after `[NAME`.
    fn read_attr(&mut self, name: Token) -> Result<(String, AttrValue)> {
        let tok = self.next()?;
        let value = match tok.kind {
            TokenKind::CloseBracket => return Ok((name.text, AttrValue::Str(String::new()))),
            TokenKind::Quoted => AttrValue::Str(tok.text),
            TokenKind::OpenBracket => AttrValue::Object(Box::new(self.read_form()?)),
            TokenKind::Other | TokenKind::Keyword(_) => {
                let first = classify_attr(tok.text);
                let tok = self.next()?;
                if tok.is(TokenKind::CloseBracket) {
                    return Ok((name.text, first));
                }
                // two reals form a UV pair
                let u = first.as_real().filter(|_| tok.is(TokenKind::Other));
                match (u, parse_real(&tok.text)) {
                    (Some(u), Some(v)) => AttrValue::Uv([u as f32, v as f32]),
                    _ => return Err(self.unexpected(&tok, &format!("']' closing attribute {}", name.text))),
                }
            }
            TokenKind::Eof => return Err(self.syntax("unexpected end of file in attribute")),
        };
        self.expect_close(&format!("attribute {}", name.text))?;
        Ok((name.text, value))
    }

    // ------------------------------------------------------------------
    // Polygons
    // ------------------------------------------------------------------

    /// `POLYGON` / `POLYLINE` / `POINTLIST` positioned after the keyword.
    pub fn read_poly(&mut self, kind: PolyKind) -> Result<Polygon> {
        let mut poly = Polygon::default();
        let n = loop {
            let tok = self.next()?;
            match tok.kind {
                TokenKind::OpenBracket => {
                    let head = self.next()?;
                    if head.keyword() == Some(Keyword::Plane) {
                        poly.plane = Some(self.reals::<4>("plane coefficient")?);
                        self.expect_close("PLANE")?;
                    } else if head.is_text() {
                        let (n, v) = self.read_attr(head)?;
                        poly.attrs.set(n, v);
                    } else {
                        return Err(self.unexpected(&head, "polygon attribute"));
                    }
                }
                TokenKind::Other => {
                    let line = self.line();
                    let n: i32 = tok.text.parse().map_err(|_| self.unexpected(&tok, "vertex count"))?;
                    break usize::try_from(n).map_err(|_| Error::semantic(line, format!("negative vertex count {n}")))?;
                }
                _ => return Err(self.unexpected(&tok, "vertex count")),
            }
        };

        poly.vertices.reserve(n.min(MAX_PREALLOC));
        for _ in 0..n {
            self.expect_open("vertex")?;
            poly.vertices.push(self.read_vertex()?);
        }
        self.expect_close(kind.keyword())?;
        poly.circular = self.circular && kind == PolyKind::Polygon;
        Ok(poly)
    }

    fn read_vertex(&mut self) -> Result<Vertex> {
        let mut vertex = Vertex::default();
        loop {
            let tok = self.next()?;
            if !tok.is(TokenKind::OpenBracket) {
                self.unget(tok)?;
                break;
            }
            let head = self.next()?;
            match head.keyword() {
                Some(Keyword::Normal) => {
                    vertex.normal = Some(self.reals::<3>("normal coordinate")?);
                    self.expect_close("NORMAL")?;
                }
                Some(Keyword::Internal) => {
                    vertex.internal = true;
                    self.expect_close("INTERNAL")?;
                }
                _ if head.is_text() => {
                    let (n, v) = self.read_attr(head)?;
                    vertex.attrs.set(n, v);
                }
                _ => return Err(self.unexpected(&head, "vertex attribute")),
            }
        }
        vertex.coord = self.reals::<3>("vertex coordinate")?;
        self.expect_close("vertex")?;
        Ok(vertex)
    }

    // ------------------------------------------------------------------
    // Parametric geometry
    // ------------------------------------------------------------------

    /// `[KV ...]` or `[KVP ...]`; `expected` gives the arity for the
    /// (periodic) flag.
    fn read_kv(&mut self, expected: impl Fn(bool) -> usize) -> Result<(bool, Vec<f64>)> {
        self.expect_open("knot vector")?;
        let tok = self.next()?;
        let periodic = match tok.keyword() {
            Some(Keyword::Kv) => false,
            Some(Keyword::Kvp) => true,
            _ => return Err(self.unexpected(&tok, "KV or KVP")),
        };
        let expected = expected(periodic);
        let mut knots = Vec::with_capacity(expected.min(MAX_PREALLOC));
        loop {
            let tok = self.next()?;
            match tok.kind {
                TokenKind::CloseBracket => break,
                TokenKind::Other => match parse_real(&tok.text) {
                    Some(v) => knots.push(v),
                    None => return Err(self.unexpected(&tok, "knot value")),
                },
                _ => return Err(self.unexpected(&tok, "knot value or ']'")),
            }
        }
        if knots.len() != expected {
            return Err(self.syntax(format!(
                "knot vector: expected {expected} values, found {}",
                knots.len()
            )));
        }
        Ok((periodic, knots))
    }

    /// Axes from lengths and orders, reading knot vectors for B-splines.
    fn read_axes(&mut self, geom_type: GeomType, lengths: &[usize], orders: &[usize]) -> Result<Vec<ParamAxis>> {
        lengths
            .iter()
            .zip(orders)
            .map(|(&length, &order)| match geom_type {
                GeomType::Bezier => Ok(ParamAxis::bezier(length)),
                GeomType::Power => Ok(ParamAxis::power(length)),
                GeomType::Bspline => {
                    if order == 0 {
                        return Err(Error::semantic(self.line(), "B-spline order must be positive"));
                    }
                    let (periodic, knots) = self.read_kv(|p| knot_vector_len(length, order, p))?;
                    Ok(ParamAxis { length, order, periodic, knots: Some(knots) })
                }
            })
            .collect()
    }

    /// `count` points; the mesh grows as they arrive.
    fn read_points(&mut self, point_type: PointType, count: usize) -> Result<ControlMesh> {
        let mut mesh = ControlMesh::with_capacity(point_type, count.min(MAX_PREALLOC));
        let mut buf = Vec::with_capacity(point_type.coord_count());
        for _ in 0..count {
            self.expect_open("control point")?;
            buf.clear();
            for _ in 0..point_type.coord_count() {
                buf.push(self.real("control point coordinate")?);
            }
            self.expect_close("control point")?;
            mesh.push_point(&buf).map_err(|e| self.located(e))?;
        }
        Ok(mesh)
    }

    /// Common shape of curves, surfaces, trivariates and multivariates:
    /// lengths, orders for B-splines, point type, knot vectors, points.
    fn read_tensor(&mut self, what: &str, dim: Option<usize>) -> Result<(GeomType, Vec<ParamAxis>, ControlMesh)> {
        let geom_type = self.geom_type()?;
        let grouped = self.open_group()?;
        let dim = match dim {
            Some(d) => d,
            None => self.count("multivariate dimension")?,
        };
        if dim == 0 {
            return Err(Error::semantic(self.line(), format!("{what} without parametric directions")));
        }
        let lengths = (0..dim)
            .map(|_| self.count(&format!("{what} length")))
            .collect::<Result<Vec<_>>>()?;
        let orders = match geom_type {
            GeomType::Bspline => (0..dim)
                .map(|_| self.count(&format!("{what} order")))
                .collect::<Result<Vec<_>>>()?,
            _ => lengths.clone(),
        };
        let point_type = self.point_type()?;
        let axes = self.read_axes(geom_type, &lengths, &orders)?;
        let count = lengths
            .iter()
            .try_fold(1usize, |acc, &l| acc.checked_mul(l))
            .ok_or_else(|| Error::semantic(self.line(), format!("{what} mesh too large")))?;
        let mesh = self.read_points(point_type, count)?;
        if grouped {
            self.expect_close(what)?;
        }
        self.expect_close(what)?;
        Ok((geom_type, axes, mesh))
    }

    /// `CURVE` positioned after the keyword.
    pub fn read_curve(&mut self) -> Result<Curve> {
        let (geom_type, mut axes, mesh) = self.read_tensor("CURVE", Some(1))?;
        let axis = axes.remove(0);
        Curve::new(geom_type, axis, mesh).map_err(|e| self.located(e))
    }

    /// `SURFACE` positioned after the keyword.
    pub fn read_surface(&mut self) -> Result<Surface> {
        let (geom_type, axes, mesh) = self.read_tensor("SURFACE", Some(2))?;
        let axes: [ParamAxis; 2] = axes
            .try_into()
            .map_err(|_| Error::semantic(self.line(), "surface needs two axes"))?;
        Surface::new(geom_type, axes, mesh).map_err(|e| self.located(e))
    }

    /// `TRIVAR` positioned after the keyword.
    pub fn read_trivar(&mut self) -> Result<Trivar> {
        let (geom_type, axes, mesh) = self.read_tensor("TRIVAR", Some(3))?;
        let axes: [ParamAxis; 3] = axes
            .try_into()
            .map_err(|_| Error::semantic(self.line(), "trivariate needs three axes"))?;
        Trivar::new(geom_type, axes, mesh).map_err(|e| self.located(e))
    }

    /// `MULTIVAR` positioned after the keyword.
    pub fn read_multivar(&mut self) -> Result<Multivar> {
        let (geom_type, axes, mesh) = self.read_tensor("MULTIVAR", None)?;
        Multivar::new(geom_type, axes, mesh).map_err(|e| self.located(e))
    }

    /// `TRISRF` positioned after the keyword.
    pub fn read_trisrf(&mut self) -> Result<TriSrf> {
        let geom_type = self.geom_type()?;
        let grouped = self.open_group()?;
        let length = self.count("TRISRF length")?;
        let order = match geom_type {
            GeomType::Bspline => self.count("TRISRF order")?,
            _ => length,
        };
        let point_type = self.point_type()?;
        let knots = match geom_type {
            GeomType::Bspline => {
                let (periodic, knots) = self.read_kv(|_| length.saturating_add(order))?;
                if periodic {
                    return Err(Error::semantic(self.line(), "triangular surfaces cannot be periodic"));
                }
                Some(knots)
            }
            _ => None,
        };
        let count = TriSrf::checked_mesh_size(length).map_err(|e| self.located(e))?;
        let mesh = self.read_points(point_type, count)?;
        if grouped {
            self.expect_close("TRISRF")?;
        }
        self.expect_close("TRISRF")?;
        TriSrf::new(geom_type, length, order, knots, mesh).map_err(|e| self.located(e))
    }

    fn read_nested_surface(&mut self) -> Result<Surface> {
        self.expect_open("surface")?;
        self.expect_keyword(Keyword::Surface, "SURFACE")?;
        self.read_surface()
    }

    /// `TRIMSRF` positioned after the keyword.
    pub fn read_trimsrf(&mut self) -> Result<TrimSrf> {
        let srf = self.read_nested_surface()?;
        let mut trim_crvs = Vec::new();
        loop {
            let tok = self.next()?;
            match tok.kind {
                TokenKind::CloseBracket => break,
                TokenKind::OpenBracket => {
                    self.expect_keyword(Keyword::TrimCrv, "TRIMCRV")?;
                    trim_crvs.push(self.read_trim_crv()?);
                }
                _ => return Err(self.unexpected(&tok, "'[TRIMCRV' or ']'")),
            }
        }
        let ts = TrimSrf::new(srf, trim_crvs);
        ts.validate().map_err(|e| self.located(e))?;
        Ok(ts)
    }

    fn read_trim_crv(&mut self) -> Result<TrimCrv> {
        let mut segs = Vec::new();
        loop {
            let tok = self.next()?;
            match tok.kind {
                TokenKind::CloseBracket => break,
                TokenKind::OpenBracket => {
                    self.expect_keyword(Keyword::TrimCrvSeg, "TRIMCRVSEG")?;
                    self.expect_open("trimming curve")?;
                    self.expect_keyword(Keyword::Curve, "CURVE")?;
                    let uv_crv = self.read_curve()?;
                    let euc_crv = match self.next()? {
                        t if t.is(TokenKind::CloseBracket) => None,
                        t if t.is(TokenKind::OpenBracket) => {
                            self.expect_keyword(Keyword::Curve, "CURVE")?;
                            let crv = self.read_curve()?;
                            self.expect_close("TRIMCRVSEG")?;
                            Some(crv)
                        }
                        t => return Err(self.unexpected(&t, "Euclidean curve or ']'")),
                    };
                    segs.push(TrimCrvSeg { uv_crv, euc_crv });
                }
                _ => return Err(self.unexpected(&tok, "'[TRIMCRVSEG' or ']'")),
            }
        }
        if segs.is_empty() {
            return Err(self.syntax("TRIMCRV without segments"));
        }
        Ok(TrimCrv { segs })
    }

    /// `MODEL` positioned after the keyword.
    pub fn read_model(&mut self) -> Result<Model> {
        let mut builder = ModelBuilder::new();
        loop {
            let tok = self.next()?;
            match tok.kind {
                TokenKind::CloseBracket => break,
                TokenKind::OpenBracket => {
                    let head = self.next()?;
                    match head.keyword() {
                        Some(Keyword::MdlTSrf) => {
                            let srf = self.read_nested_surface()?;
                            let loops = self.read_mdl_loops()?;
                            builder.push_srf(srf, loops);
                        }
                        Some(Keyword::MdlTSeg) => builder.push_seg(self.read_mdl_seg()?),
                        _ => return Err(self.unexpected(&head, "MDLTSRF or MDLTSEG")),
                    }
                }
                _ => return Err(self.unexpected(&tok, "'[MDLTSRF', '[MDLTSEG' or ']'")),
            }
        }
        builder.patch_trimming_seg_pointers().map_err(|e| self.located(e))
    }

    fn read_mdl_loops(&mut self) -> Result<Vec<Vec<i32>>> {
        let mut loops = Vec::new();
        loop {
            let tok = self.next()?;
            match tok.kind {
                TokenKind::CloseBracket => return Ok(loops),
                TokenKind::OpenBracket => {
                    self.expect_keyword(Keyword::MdlLoop, "MDLLOOP")?;
                    let mut refs = Vec::new();
                    loop {
                        let tok = self.next()?;
                        if tok.is(TokenKind::CloseBracket) {
                            break;
                        }
                        match tok.text.parse::<i32>() {
                            Ok(r) if tok.is(TokenKind::Other) => refs.push(r),
                            _ => return Err(self.unexpected(&tok, "segment reference")),
                        }
                    }
                    loops.push(refs);
                }
                _ => return Err(self.unexpected(&tok, "'[MDLLOOP' or ']'")),
            }
        }
    }

    fn read_mdl_seg(&mut self) -> Result<RawMdlTrimSeg> {
        let srf_first = self.int("surface index")?;
        let srf_second = self.int("surface index")?;
        let uv_crv_first = self.read_opt_curve()?;
        let uv_crv_second = self.read_opt_curve()?;
        let euc_crv = self.read_opt_curve()?;
        self.expect_close("MDLTSEG")?;
        Ok(RawMdlTrimSeg { uv_crv_first, uv_crv_second, euc_crv, srf_first, srf_second })
    }

    fn read_opt_curve(&mut self) -> Result<Option<Curve>> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::Keyword(Keyword::None) => Ok(None),
            TokenKind::OpenBracket => {
                self.expect_keyword(Keyword::Curve, "CURVE")?;
                self.read_curve().map(Some)
            }
            _ => Err(self.unexpected(&tok, "'[CURVE' or NONE")),
        }
    }
}

/// Integer when the text is a plain integer, real when it parses as one
/// (`NaN` and `inf` included), string otherwise.
fn classify_attr(text: String) -> AttrValue {
    if let Ok(i) = text.parse::<i32>() {
        return AttrValue::Int(i);
    }
    match parse_real(&text) {
        Some(r) => AttrValue::Real(r),
        None => AttrValue::Str(text),
    }
}
