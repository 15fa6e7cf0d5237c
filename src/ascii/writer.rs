//! Text writer mirroring [`AsciiReader`](super::AsciiReader).
//!
//! Output is rendered into a buffer and handed to the stream in one write, so
//! a geometry that fails validation halfway through a call leaves nothing
//! behind on the stream.

use std::fmt::Write as _;
use std::io::Write as _;

use crate::config::ParserConfig;
use crate::lexer::Keyword;
use crate::object::*;
use crate::stream::Stream;
use crate::util::{mat_to_rows, real_to_string, DMat4, Error, Result};

/// Text renderer with indentation discipline.
#[derive(Debug, Clone)]
pub struct AsciiWriter {
    out: String,
    indent_step: usize,
    knots_per_line: usize,
}

impl Default for AsciiWriter {
    fn default() -> Self {
        Self::new(&ParserConfig::default())
    }
}

impl AsciiWriter {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            out: String::new(),
            indent_step: config.indent_step,
            knots_per_line: config.knots_per_line.max(1),
        }
    }

    /// Rendered text so far.
    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }

    /// Hand the rendered text to a stream.
    pub fn finish(self, stream: &mut Stream) -> Result<()> {
        stream.write_bytes(self.out.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    fn line(&mut self, indent: usize, text: &str) {
        self.out.extend(std::iter::repeat(' ').take(indent));
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Comment block: every line prefixed with `# `.
    pub fn comment(&mut self, text: &str) {
        for l in text.lines() {
            self.line(0, &format!("# {l}"));
        }
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    /// Full `[OBJECT ...]` form. The subtree is validated before anything is
    /// rendered.
    pub fn object(&mut self, obj: &Object, indent: usize) -> Result<()> {
        obj.validate()?;
        self.object_unchecked(obj, indent);
        Ok(())
    }

    fn object_unchecked(&mut self, obj: &Object, indent: usize) {
        let inner = indent + self.indent_step;
        match &obj.name {
            Some(n) => self.line(indent, &format!("[OBJECT {}", word(n))),
            None => self.line(indent, "[OBJECT"),
        }
        self.attrs(&obj.attrs, inner);

        match &obj.kind {
            ObjectKind::Undefined => {}
            ObjectKind::List(children) => {
                for c in children {
                    self.object_unchecked(c, inner);
                }
            }
            ObjectKind::Poly(pl) => {
                for p in &pl.polys {
                    self.polygon(pl.kind, p, inner);
                }
            }
            ObjectKind::Numeric(v) => self.line(inner, &format!("[NUMBER {}]", real_to_string(*v))),
            ObjectKind::String(s) => self.line(inner, &format!("[STRING {}]", quote(s))),
            ObjectKind::Point(p) => self.line(inner, &format!("[POINT {}]", reals(p))),
            ObjectKind::Vector(v) => self.line(inner, &format!("[VECTOR {}]", reals(v))),
            ObjectKind::Plane(p) => self.line(inner, &format!("[PLANE {}]", reals(p))),
            ObjectKind::CtlPt(c) => self.line(inner, &format!("[CTLPT {} {}]", c.point_type, reals(&c.coords))),
            ObjectKind::Matrix(m) => {
                self.line(inner, "[MATRIX");
                self.matrix_rows(m, inner + self.indent_step);
                self.line(inner, "]");
            }
            ObjectKind::Instance(inst) => {
                self.line(inner, &format!("[INSTANCE {}", word(&inst.target)));
                self.matrix_rows(&inst.mat, inner + self.indent_step);
                self.line(inner, "]");
            }
            ObjectKind::Curve(v) => v.iter().for_each(|c| self.curve_unchecked(c, inner)),
            ObjectKind::Surface(v) => v.iter().for_each(|s| self.surface_unchecked(s, inner)),
            ObjectKind::TrimSrf(v) => v.iter().for_each(|t| self.trimsrf_unchecked(t, inner)),
            ObjectKind::Trivar(v) => v.iter().for_each(|t| self.trivar_unchecked(t, inner)),
            ObjectKind::TriSrf(v) => v.iter().for_each(|t| self.trisrf_unchecked(t, inner)),
            ObjectKind::Model(v) => v.iter().for_each(|m| self.model_unchecked(m, inner)),
            ObjectKind::Multivar(v) => v.iter().for_each(|m| self.multivar_unchecked(m, inner)),
        }
        self.line(indent, "]");
    }

    fn matrix_rows(&mut self, m: &DMat4, indent: usize) {
        let rows = mat_to_rows(m);
        for row in rows.chunks(4) {
            self.line(indent, &reals(row));
        }
    }

    fn attrs(&mut self, attrs: &Attributes, indent: usize) {
        for a in attrs {
            match &a.value {
                AttrValue::Object(obj) => {
                    self.line(indent, &format!("[{}", attr_name(&a.name)));
                    self.object_unchecked(obj, indent + self.indent_step);
                    self.line(indent, "]");
                }
                v if !v.is_persistent() => {
                    tracing::trace!("skipping non-persistent attribute {}", a.name);
                }
                v => {
                    let text = attr_text(v);
                    self.line(indent, &format!("[{} {}]", attr_name(&a.name), text));
                }
            }
        }
    }

    fn polygon(&mut self, kind: PolyKind, poly: &Polygon, indent: usize) {
        let mut head = format!("[{}", kind.keyword());
        if let Some(pl) = &poly.plane {
            let _ = write!(head, " [PLANE {}]", reals(pl));
        }
        self.line(indent, &head);
        let inner = indent + self.indent_step;
        self.attrs(&poly.attrs, inner);
        self.line(inner, &poly.vertices.len().to_string());
        for v in &poly.vertices {
            self.vertex(v, inner);
        }
        self.line(indent, "]");
    }

    /// One line per vertex; a nested object attribute breaks it into a block.
    fn vertex(&mut self, v: &Vertex, indent: usize) {
        let nested = indent + self.indent_step;
        let mut at = indent;
        let mut text = String::from("[");
        if let Some(n) = &v.normal {
            let _ = write!(text, "[NORMAL {}] ", reals(n));
        }
        if v.internal {
            text.push_str("[INTERNAL] ");
        }
        for a in v.attrs.persistent() {
            match &a.value {
                AttrValue::Object(obj) => {
                    if !text.trim().is_empty() {
                        self.line(at, text.trim_end());
                    }
                    text.clear();
                    at = nested;
                    self.line(nested, &format!("[{}", attr_name(&a.name)));
                    self.object_unchecked(obj, nested + self.indent_step);
                    self.line(nested, "]");
                }
                value => {
                    let _ = write!(text, "[{} {}] ", attr_name(&a.name), attr_text(value));
                }
            }
        }
        let _ = write!(text, "{}]", reals(&v.coord));
        self.line(at, &text);
    }

    // ------------------------------------------------------------------
    // Parametric geometry
    // ------------------------------------------------------------------

    fn knots(&mut self, indent: usize, periodic: bool, knots: &[f64]) {
        let head = if periodic { "[KVP" } else { "[KV" };
        let mut chunks = knots.chunks(self.knots_per_line).peekable();
        let mut text = head.to_string();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            if !first {
                self.line(indent, &text);
                text = " ".repeat(head.len());
            }
            first = false;
            let _ = write!(text, " {}", reals(chunk));
            if chunks.peek().is_none() {
                text.push(']');
            }
        }
        if knots.is_empty() {
            text.push(']');
        }
        self.line(indent, &text);
    }

    fn points(&mut self, mesh: &ControlMesh, indent: usize) {
        for i in 0..mesh.len() {
            self.line(indent, &format!("[{}]", reals(&mesh.point(i))));
        }
    }

    fn tensor(&mut self, keyword: &str, geom_type: GeomType, axes: &[ParamAxis], mesh: &ControlMesh, indent: usize, with_dim: bool) {
        let mut head = format!("[{keyword} {}", geom_type.keyword());
        if with_dim {
            let _ = write!(head, " {}", axes.len());
        }
        for a in axes {
            let _ = write!(head, " {}", a.length);
        }
        if geom_type == GeomType::Bspline {
            for a in axes {
                let _ = write!(head, " {}", a.order);
            }
        }
        let _ = write!(head, " {}", mesh.point_type);
        self.line(indent, &head);

        let inner = indent + self.indent_step;
        for a in axes {
            if let Some(k) = &a.knots {
                self.knots(inner, a.periodic, k);
            }
        }
        self.points(mesh, inner);
        self.line(indent, "]");
    }

    fn curve_unchecked(&mut self, crv: &Curve, indent: usize) {
        self.tensor("CURVE", crv.geom_type, std::slice::from_ref(&crv.axis), &crv.mesh, indent, false);
    }

    fn surface_unchecked(&mut self, srf: &Surface, indent: usize) {
        self.tensor("SURFACE", srf.geom_type, &srf.axes, &srf.mesh, indent, false);
    }

    fn trivar_unchecked(&mut self, tv: &Trivar, indent: usize) {
        self.tensor("TRIVAR", tv.geom_type, &tv.axes, &tv.mesh, indent, false);
    }

    fn multivar_unchecked(&mut self, mv: &Multivar, indent: usize) {
        self.tensor("MULTIVAR", mv.geom_type, &mv.axes, &mv.mesh, indent, true);
    }

    fn trisrf_unchecked(&mut self, ts: &TriSrf, indent: usize) {
        let mut head = format!("[TRISRF {} {}", ts.geom_type.keyword(), ts.length);
        if ts.geom_type == GeomType::Bspline {
            let _ = write!(head, " {}", ts.order);
        }
        let _ = write!(head, " {}", ts.mesh.point_type);
        self.line(indent, &head);
        let inner = indent + self.indent_step;
        if let Some(k) = &ts.knots {
            self.knots(inner, false, k);
        }
        self.points(&ts.mesh, inner);
        self.line(indent, "]");
    }

    fn trimsrf_unchecked(&mut self, ts: &TrimSrf, indent: usize) {
        let step = self.indent_step;
        self.line(indent, "[TRIMSRF");
        self.surface_unchecked(&ts.srf, indent + step);
        for tc in &ts.trim_crvs {
            self.line(indent + step, "[TRIMCRV");
            for seg in &tc.segs {
                self.line(indent + 2 * step, "[TRIMCRVSEG");
                self.curve_unchecked(&seg.uv_crv, indent + 3 * step);
                if let Some(euc) = &seg.euc_crv {
                    self.curve_unchecked(euc, indent + 3 * step);
                }
                self.line(indent + 2 * step, "]");
            }
            self.line(indent + step, "]");
        }
        self.line(indent, "]");
    }

    fn model_unchecked(&mut self, mdl: &Model, indent: usize) {
        let step = self.indent_step;
        self.line(indent, "[MODEL");
        for ts in &mdl.trim_srfs {
            self.line(indent + step, "[MDLTSRF");
            self.surface_unchecked(&ts.srf, indent + 2 * step);
            for lp in &ts.loops {
                let refs: Vec<String> = lp.seg_refs.iter().map(|r| r.to_wire().to_string()).collect();
                self.line(indent + 2 * step, &format!("[MDLLOOP {}]", refs.join(" ")));
            }
            self.line(indent + step, "]");
        }
        for seg in &mdl.segs {
            self.line(
                indent + step,
                &format!("[MDLTSEG {} {}", Model::srf_index(seg.srf_first), Model::srf_index(seg.srf_second)),
            );
            for crv in [&seg.uv_crv_first, &seg.uv_crv_second, &seg.euc_crv] {
                match crv {
                    Some(c) => self.curve_unchecked(c, indent + 2 * step),
                    None => self.line(indent + 2 * step, "NONE"),
                }
            }
            self.line(indent + step, "]");
        }
        self.line(indent, "]");
    }

    /// Bare `[CURVE ...]` form.
    pub fn curve(&mut self, crv: &Curve, indent: usize) -> Result<()> {
        crv.validate()?;
        self.curve_unchecked(crv, indent);
        Ok(())
    }

    /// Bare `[SURFACE ...]` form.
    pub fn surface(&mut self, srf: &Surface, indent: usize) -> Result<()> {
        srf.validate()?;
        self.surface_unchecked(srf, indent);
        Ok(())
    }

    pub fn trivar(&mut self, tv: &Trivar, indent: usize) -> Result<()> {
        tv.validate()?;
        self.trivar_unchecked(tv, indent);
        Ok(())
    }

    pub fn multivar(&mut self, mv: &Multivar, indent: usize) -> Result<()> {
        mv.validate()?;
        self.multivar_unchecked(mv, indent);
        Ok(())
    }

    pub fn trisrf(&mut self, ts: &TriSrf, indent: usize) -> Result<()> {
        ts.validate()?;
        self.trisrf_unchecked(ts, indent);
        Ok(())
    }

    pub fn trimsrf(&mut self, ts: &TrimSrf, indent: usize) -> Result<()> {
        ts.validate()?;
        self.trimsrf_unchecked(ts, indent);
        Ok(())
    }

    pub fn model(&mut self, mdl: &Model, indent: usize) -> Result<()> {
        mdl.validate()?;
        self.model_unchecked(mdl, indent);
        Ok(())
    }

    /// Write a chain of objects that must all carry `expected` geometry.
    /// Every element is checked before anything is rendered.
    pub fn chain(&mut self, objects: &[Object], expected: ObjType, indent: usize) -> Result<()> {
        for obj in objects {
            if obj.obj_type() != expected {
                return Err(Error::kind_mismatch(expected.name(), obj.obj_type().name()));
            }
            obj.validate()?;
        }
        for obj in objects {
            self.object_unchecked(obj, indent);
        }
        Ok(())
    }
}

/// Space separated reals.
fn reals(vals: &[f64]) -> String {
    let mut out = String::new();
    for (i, v) in vals.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&real_to_string(*v));
    }
    out
}

fn attr_text(value: &AttrValue) -> String {
    match value {
        AttrValue::Int(i) => i.to_string(),
        AttrValue::Real(r) => real_to_string(*r),
        AttrValue::Uv([u, v]) => format!("{} {}", real_to_string(*u as f64), real_to_string(*v as f64)),
        AttrValue::Str(s) => quote(s),
        AttrValue::Object(_) | AttrValue::Ptr(_) | AttrValue::RefPtr(_) => String::new(),
    }
}

/// Quote a string, escaping `"` and `\`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// A name as a bareword when it lexes back unchanged, quoted otherwise.
fn word(s: &str) -> String {
    let bare = !s.is_empty()
        && !s.starts_with('#')
        && s.chars().all(|c| !c.is_whitespace() && !c.is_control() && !matches!(c, '[' | ']' | '"'));
    if bare {
        s.to_string()
    } else {
        quote(s)
    }
}

/// Attribute names that collide with body or polygon keywords are quoted so
/// the reader does not take them for a form.
fn attr_name(s: &str) -> String {
    match Keyword::lookup(s) {
        Some(k) if k.is_form() || matches!(k, Keyword::Normal | Keyword::Internal) => quote(s),
        _ => word(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic() -> Curve {
        Curve::bspline(3, PointType::E2, &[[0.0, 0.0], [1.0, 1.0], [2.0, 0.0], [3.0, 1.0]]).unwrap()
    }

    #[test]
    fn test_curve_text() {
        let mut w = AsciiWriter::default();
        w.curve(&quadratic(), 0).unwrap();
        let text = w.into_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "[CURVE BSPLINE 4 3 E2");
        assert_eq!(lines[1], "    [KV 0.0 0.0 0.0 1.0 2.0 2.0 2.0]");
        assert_eq!(lines[2], "    [0.0 0.0]");
        assert_eq!(lines.last(), Some(&"]"));
    }

    #[test]
    fn test_knot_wrapping() {
        let cfg = ParserConfig::default().with_knots_per_line(3);
        let mut w = AsciiWriter::new(&cfg);
        w.knots(0, false, &[0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(w.as_str(), "[KV 0.0 0.0 0.0\n    1.0 2.0 2.0\n    2.0]\n");
    }

    #[test]
    fn test_invalid_geometry_writes_nothing() {
        let mut crv = quadratic();
        crv.axis.knots = Some(vec![0.0; 3]);
        let mut w = AsciiWriter::default();
        assert!(w.object(&Object::curve(crv), 0).is_err());
        assert!(w.as_str().is_empty());
    }

    #[test]
    fn test_chain_kind_mismatch() {
        let objs = vec![Object::curve(quadratic()), Object::new(ObjectKind::Numeric(1.0))];
        let mut w = AsciiWriter::default();
        let err = w.chain(&objs, ObjType::Curve, 0).unwrap_err();
        assert!(matches!(err, Error::KindMismatch { .. }));
        assert!(w.as_str().is_empty());
    }

    #[test]
    fn test_names_and_strings() {
        assert_eq!(word("CUBE"), "CUBE");
        assert_eq!(word("two words"), "\"two words\"");
        assert_eq!(word(""), "\"\"");
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(attr_name("point"), "\"point\"");
        assert_eq!(attr_name("color"), "color");
    }

    #[test]
    fn test_non_persistent_attrs_skipped() {
        let mut obj = Object::new(ObjectKind::Numeric(1.0)).with_name("n").with_attr("color", 3);
        obj.attrs.set("host", AttrValue::Ptr(7));
        let mut w = AsciiWriter::default();
        w.object(&obj, 0).unwrap();
        assert!(w.as_str().contains("[color 3]"));
        assert!(!w.as_str().contains("host"));
    }
}
