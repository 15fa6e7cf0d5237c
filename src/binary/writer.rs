//! Binary writer.
//!
//! Fields are written one at a time in a fixed order, in the byte order chosen
//! by the type parameter. Records are rendered into a buffer first and handed
//! to the stream in one write.

use std::io::Write as _;
use std::marker::PhantomData;

use byteorder::{ByteOrder, WriteBytesExt};

use super::format::*;
use crate::object::*;
use crate::stream::Stream;
use crate::util::{mat_to_rows, Result};

/// Record renderer for one byte order.
pub struct BinaryWriter<E: ByteOrder> {
    buf: Vec<u8>,
    _order: PhantomData<E>,
}

impl<E: ByteOrder> Default for BinaryWriter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ByteOrder> BinaryWriter<E> {
    pub fn new() -> Self {
        Self { buf: Vec::new(), _order: PhantomData }
    }

    /// Bytes rendered so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Hand the rendered records to a stream.
    pub fn finish(self, stream: &mut Stream) -> Result<()> {
        stream.write_bytes(&self.buf)?;
        stream.flush()?;
        Ok(())
    }

    /// Write one top-level object. Invalid geometry writes nothing.
    pub fn object(&mut self, obj: &Object) -> Result<()> {
        obj.validate()?;
        self.object_record(obj)
    }

    // ========================================================================
    // Fields
    // ========================================================================

    fn sync(&mut self, kind: u32) -> Result<()> {
        self.u32(make_sync(kind))
    }

    fn u32(&mut self, v: u32) -> Result<()> {
        self.buf.write_u32::<E>(v)?;
        Ok(())
    }

    fn i32(&mut self, v: i32) -> Result<()> {
        self.buf.write_i32::<E>(v)?;
        Ok(())
    }

    fn f32(&mut self, v: f32) -> Result<()> {
        self.buf.write_f32::<E>(v)?;
        Ok(())
    }

    fn f64(&mut self, v: f64) -> Result<()> {
        self.buf.write_f64::<E>(v)?;
        Ok(())
    }

    fn f64s(&mut self, vals: &[f64]) -> Result<()> {
        vals.iter().try_for_each(|v| self.f64(*v))
    }

    /// Pair of header words, the second reserved.
    fn header(&mut self, a: u32, b: u32) -> Result<()> {
        self.u32(a)?;
        self.u32(b)
    }

    fn pad(&mut self, len: usize, align: usize) {
        let n = pad_to_align(len, align);
        self.buf.extend(std::iter::repeat(0u8).take(n));
    }

    fn string(&mut self, s: &str) -> Result<()> {
        self.u32(s.len() as u32)?;
        self.buf.write_all(s.as_bytes())?;
        self.pad(s.len(), STRING_ALIGN);
        Ok(())
    }

    /// Counted real array: count, reserved word, values.
    fn reals(&mut self, vals: &[f64]) -> Result<()> {
        self.header(vals.len() as u32, 0)?;
        self.f64s(vals)
    }

    // ========================================================================
    // Objects
    // ========================================================================

    fn object_record(&mut self, obj: &Object) -> Result<()> {
        let has_attrs = obj.attrs.persistent().next().is_some();
        let mut flags = 0;
        if obj.name.is_some() {
            flags |= OBJ_HAS_NAME;
        }
        if has_attrs {
            flags |= OBJ_HAS_ATTRS;
        }

        self.sync(obj.obj_type() as u32)?;
        self.header(flags, 0)?;
        if let Some(name) = &obj.name {
            self.sync(AUX_STRING)?;
            self.string(name)?;
        }
        if has_attrs {
            self.attrs(&obj.attrs)?;
        }

        match &obj.kind {
            ObjectKind::Undefined => Ok(()),
            ObjectKind::Poly(pl) => self.poly_list(pl),
            ObjectKind::Numeric(v) => self.f64(*v),
            ObjectKind::Point(p) | ObjectKind::Vector(p) => self.f64s(p),
            ObjectKind::Plane(pl) => self.f64s(pl),
            ObjectKind::CtlPt(c) => {
                self.header(c.point_type.to_code(), 0)?;
                self.f64s(&c.coords)
            }
            ObjectKind::Matrix(m) => self.f64s(&mat_to_rows(m)),
            ObjectKind::Instance(inst) => {
                self.string(&inst.target)?;
                self.f64s(&mat_to_rows(&inst.mat))
            }
            ObjectKind::String(s) => self.string(s),
            ObjectKind::List(children) => {
                self.sync(AUX_OLST)?;
                self.header(children.len() as u32, 0)?;
                for c in children {
                    self.object_record(c)?;
                }
                self.sync(AUX_END)
            }
            ObjectKind::Curve(v) => self.chain(v, AUX_CURVE, Self::curve),
            ObjectKind::Surface(v) => self.chain(v, AUX_SURFACE, Self::surface),
            ObjectKind::TrimSrf(v) => self.chain(v, AUX_TRIMSRF, Self::trimsrf),
            ObjectKind::Trivar(v) => self.chain(v, AUX_TRIVAR, Self::trivar),
            ObjectKind::TriSrf(v) => self.chain(v, AUX_TRISRF, Self::trisrf),
            ObjectKind::Model(v) => self.chain(v, AUX_MDL_TSRF, Self::model),
            ObjectKind::Multivar(v) => self.chain(v, AUX_MULTIVAR, Self::multivar),
        }
    }

    fn chain<T>(&mut self, items: &[T], marker: u32, mut f: impl FnMut(&mut Self, &T) -> Result<()>) -> Result<()> {
        self.header(items.len() as u32, 0)?;
        for item in items {
            self.sync(marker)?;
            f(self, item)?;
        }
        self.sync(AUX_END)
    }

    fn attrs(&mut self, attrs: &Attributes) -> Result<()> {
        for attr in attrs.persistent() {
            self.sync(AUX_ATTR)?;
            self.string(&attr.name)?;
            match &attr.value {
                AttrValue::Int(v) => {
                    self.header(ATTR_INT, 0)?;
                    self.i32(*v)?;
                    self.i32(0)?;
                }
                AttrValue::Real(v) => {
                    self.header(ATTR_REAL, 0)?;
                    self.f64(*v)?;
                }
                AttrValue::Uv([u, v]) => {
                    self.header(ATTR_UV, 0)?;
                    self.f32(*u)?;
                    self.f32(*v)?;
                }
                AttrValue::Str(s) => {
                    self.header(ATTR_STR, 0)?;
                    self.string(s)?;
                }
                AttrValue::Object(o) => {
                    self.header(ATTR_OBJECT, 0)?;
                    self.object_record(o)?;
                }
                // persistent() already filtered these
                AttrValue::Ptr(_) | AttrValue::RefPtr(_) => {}
            }
        }
        self.sync(AUX_END)
    }

    fn poly_list(&mut self, pl: &PolyList) -> Result<()> {
        self.header(pl.kind.to_code(), pl.polys.len() as u32)?;
        for poly in &pl.polys {
            let has_attrs = poly.attrs.persistent().next().is_some();
            let mut flags = 0;
            if poly.plane.is_some() {
                flags |= POLY_HAS_PLANE;
            }
            if has_attrs {
                flags |= POLY_HAS_ATTRS;
            }
            if poly.circular {
                flags |= POLY_CIRCULAR;
            }

            self.sync(AUX_POLY)?;
            self.header(flags, poly.vertices.len() as u32)?;
            self.f64s(&poly.plane.unwrap_or_default())?;
            if has_attrs {
                self.attrs(&poly.attrs)?;
            }
            for v in &poly.vertices {
                self.vertex(v)?;
            }
        }
        self.sync(AUX_END)
    }

    fn vertex(&mut self, v: &Vertex) -> Result<()> {
        let has_attrs = v.attrs.persistent().next().is_some();
        let mut flags = 0;
        if v.normal.is_some() {
            flags |= VERTEX_HAS_NORMAL;
        }
        if v.internal {
            flags |= VERTEX_INTERNAL;
        }
        if has_attrs {
            flags |= VERTEX_HAS_ATTRS;
        }

        self.sync(AUX_VERTEX)?;
        self.header(flags, 0)?;
        self.f64s(&v.coord)?;
        if let Some(n) = &v.normal {
            self.f64s(n)?;
        }
        if has_attrs {
            self.attrs(&v.attrs)?;
        }
        Ok(())
    }

    // ========================================================================
    // Geometry records
    // ========================================================================

    fn axis(&mut self, axis: &ParamAxis) -> Result<()> {
        self.header(axis.length as u32, axis.order as u32)?;
        self.header(axis.periodic as u32, axis.knots.is_some() as u32)?;
        if let Some(knots) = &axis.knots {
            self.reals(knots)?;
        }
        Ok(())
    }

    fn mesh(&mut self, mesh: &ControlMesh) -> Result<()> {
        for slot in mesh.slots() {
            self.reals(mesh.coords[slot].as_deref().unwrap_or_default())?;
        }
        Ok(())
    }

    fn curve(&mut self, crv: &Curve) -> Result<()> {
        self.header(crv.geom_type.to_code(), crv.point_type().to_code())?;
        self.axis(&crv.axis)?;
        self.mesh(&crv.mesh)
    }

    fn surface(&mut self, srf: &Surface) -> Result<()> {
        self.header(srf.geom_type.to_code(), srf.point_type().to_code())?;
        srf.axes.iter().try_for_each(|a| self.axis(a))?;
        self.mesh(&srf.mesh)
    }

    fn trivar(&mut self, tv: &Trivar) -> Result<()> {
        self.header(tv.geom_type.to_code(), tv.mesh.point_type.to_code())?;
        tv.axes.iter().try_for_each(|a| self.axis(a))?;
        self.mesh(&tv.mesh)
    }

    fn multivar(&mut self, mv: &Multivar) -> Result<()> {
        self.header(mv.geom_type.to_code(), mv.mesh.point_type.to_code())?;
        self.header(mv.dim() as u32, 0)?;
        mv.axes.iter().try_for_each(|a| self.axis(a))?;
        self.mesh(&mv.mesh)
    }

    fn trisrf(&mut self, ts: &TriSrf) -> Result<()> {
        self.header(ts.geom_type.to_code(), ts.mesh.point_type.to_code())?;
        self.header(ts.length as u32, ts.order as u32)?;
        self.header(ts.knots.is_some() as u32, 0)?;
        if let Some(knots) = &ts.knots {
            self.reals(knots)?;
        }
        self.mesh(&ts.mesh)
    }

    fn trimsrf(&mut self, ts: &TrimSrf) -> Result<()> {
        self.sync(AUX_SURFACE)?;
        self.surface(&ts.srf)?;
        self.header(ts.trim_crvs.len() as u32, 0)?;
        for tc in &ts.trim_crvs {
            self.sync(AUX_TRIMCRV)?;
            self.header(tc.segs.len() as u32, 0)?;
            for seg in &tc.segs {
                self.sync(AUX_TRIMSEG)?;
                self.header(seg.euc_crv.is_some() as u32, 0)?;
                self.curve(&seg.uv_crv)?;
                if let Some(euc) = &seg.euc_crv {
                    self.curve(euc)?;
                }
            }
            self.sync(AUX_END)?;
        }
        self.sync(AUX_END)
    }

    fn model(&mut self, mdl: &Model) -> Result<()> {
        self.header(mdl.trim_srfs.len() as u32, mdl.segs.len() as u32)?;

        for ts in &mdl.trim_srfs {
            self.sync(AUX_SURFACE)?;
            self.surface(&ts.srf)?;
            self.header(ts.loops.len() as u32, 0)?;
            for lp in &ts.loops {
                self.sync(AUX_MDL_LOOP)?;
                self.u32(lp.seg_refs.len() as u32)?;
                for r in &lp.seg_refs {
                    self.i32(r.to_wire())?;
                }
                self.pad(4 * (lp.seg_refs.len() + 1), RECORD_ALIGN);
            }
            self.sync(AUX_END)?;
        }
        self.sync(AUX_END)?;

        for seg in &mdl.segs {
            let curves = [&seg.uv_crv_first, &seg.uv_crv_second, &seg.euc_crv];
            let mut mask = 0;
            for (bit, c) in [SEG_UV_FIRST, SEG_UV_SECOND, SEG_EUC].into_iter().zip(curves) {
                if c.is_some() {
                    mask |= bit;
                }
            }

            self.sync(AUX_MDL_TSEG)?;
            self.i32(Model::srf_index(seg.srf_first))?;
            self.i32(Model::srf_index(seg.srf_second))?;
            self.header(mask, 0)?;
            for c in curves.into_iter().flatten() {
                self.curve(c)?;
            }
        }
        self.sync(AUX_END)
    }
}
