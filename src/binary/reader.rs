//! Binary reader.
//!
//! The byte order of a stream is decided by its first sync word and kept on
//! the stream. Every field is read in native order and swapped when needed.

use byteorder::{ByteOrder, NativeEndian};

use super::format::*;
use crate::object::*;
use crate::stream::Stream;
use crate::util::{mat_from_rows, BinaryError, Error, Result, MAX_PREALLOC};

/// Called with every top-level object; `None` drops it.
pub type LeafHook<'h> = dyn FnMut(Object) -> Option<Object> + 'h;

/// Record reader over a stream.
pub struct BinaryReader<'a> {
    stream: &'a mut Stream,
}

impl<'a> BinaryReader<'a> {
    pub fn new(stream: &'a mut Stream) -> Self {
        Self { stream }
    }

    /// Read objects until end of input or a framing marker, or just one in
    /// `single` mode, and wrap them into a list.
    pub fn read_all(&mut self, single: bool, mut hook: Option<&mut LeafHook<'_>>) -> Result<Object> {
        let mut objects = Vec::new();
        while let Some(obj) = self.read_next()? {
            let obj = match hook.as_deref_mut() {
                Some(h) => h(obj),
                None => Some(obj),
            };
            objects.extend(obj);
            if single {
                break;
            }
        }
        tracing::debug!("read {} binary objects", objects.len());
        Ok(Object::list(objects))
    }

    /// Next top-level object. `None` at end of input, or when the next sync
    /// word is a framing marker (it stays pending on the stream).
    pub fn read_next(&mut self) -> Result<Option<Object>> {
        let word = match self.stream.take_sync() {
            Some(w) => w,
            None => match self.raw_sync_or_eof()? {
                Some(w) => w,
                None => return Ok(None),
            },
        };
        let kind = decode_sync(word)?;
        if is_aux(kind) {
            self.stream.push_sync(word);
            return Ok(None);
        }
        self.object_body(kind).map(Some)
    }

    // ========================================================================
    // Fields
    // ========================================================================

    /// Sync word at a record boundary, in native order. `None` if the stream
    /// ends cleanly before it.
    fn raw_sync_or_eof(&mut self) -> Result<Option<u32>> {
        let Some(first) = self.stream.get_byte()? else {
            return Ok(None);
        };
        let mut buf = [first, 0, 0, 0];
        self.stream.read_exact_bytes(&mut buf[1..])?;
        let raw = NativeEndian::read_u32(&buf);

        let swap = match self.stream.swap_endian() {
            Some(s) => s,
            None => {
                let s = detect_swap(raw)?;
                if s {
                    tracing::debug!("binary stream is byte swapped");
                }
                self.stream.set_swap_endian(s);
                s
            }
        };
        Ok(Some(if swap { raw.swap_bytes() } else { raw }))
    }

    fn swap(&self) -> bool {
        self.stream.swap_endian().unwrap_or(false)
    }

    fn bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.stream.read_exact_bytes(&mut buf)?;
        if self.swap() {
            buf.reverse();
        }
        Ok(buf)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(NativeEndian::read_u32(&self.bytes::<4>()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(NativeEndian::read_i32(&self.bytes::<4>()?))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(NativeEndian::read_f32(&self.bytes::<4>()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(NativeEndian::read_f64(&self.bytes::<8>()?))
    }

    fn f64s<const N: usize>(&mut self) -> Result<[f64; N]> {
        let mut out = [0.0; N];
        for v in &mut out {
            *v = self.f64()?;
        }
        Ok(out)
    }

    /// Pair of header words.
    fn header(&mut self) -> Result<(u32, u32)> {
        Ok((self.u32()?, self.u32()?))
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        let mut buf = [0u8; RECORD_ALIGN];
        self.stream.read_exact_bytes(&mut buf[..n])
    }

    /// Kind of the next sync word.
    fn sync(&mut self) -> Result<u32> {
        let word = match self.stream.take_sync() {
            Some(w) => w,
            None => self.raw_sync_or_eof()?.ok_or(BinaryError::Truncated)?,
        };
        decode_sync(word)
    }

    fn expect(&mut self, expected: u32) -> Result<()> {
        let actual = self.sync()?;
        if actual != expected {
            return Err(BinaryError::UnexpectedKind { expected, actual }.into());
        }
        Ok(())
    }

    /// Closing marker of a counted sequence.
    fn end(&mut self, what: &'static str) -> Result<()> {
        if self.sync()? != AUX_END {
            return Err(BinaryError::Unterminated(what).into());
        }
        Ok(())
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let mut bytes = Vec::with_capacity(len.min(MAX_PREALLOC));
        let mut chunk = [0u8; 4096];
        let mut left = len;
        while left > 0 {
            let n = left.min(chunk.len());
            self.stream.read_exact_bytes(&mut chunk[..n])?;
            bytes.extend_from_slice(&chunk[..n]);
            left -= n;
        }
        self.skip(pad_to_align(len, STRING_ALIGN))?;
        Ok(String::from_utf8(bytes)?)
    }

    fn reals(&mut self) -> Result<Vec<f64>> {
        let (count, _) = self.header()?;
        let count = count as usize;
        let mut out = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            out.push(self.f64()?);
        }
        Ok(out)
    }

    fn flag(v: u32) -> Result<bool> {
        match v {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::invalid(format!("bad boolean field {v}"))),
        }
    }

    // ========================================================================
    // Objects
    // ========================================================================

    fn object_record(&mut self) -> Result<Object> {
        let kind = self.sync()?;
        self.object_body(kind)
    }

    fn object_body(&mut self, kind: u32) -> Result<Object> {
        let obj_type = ObjType::from_u32(kind).ok_or(BinaryError::UnknownKind(kind))?;
        let (flags, _) = self.header()?;

        let mut obj = Object::default();
        if flags & OBJ_HAS_NAME != 0 {
            self.expect(AUX_STRING)?;
            obj.name = Some(self.string()?);
        }
        if flags & OBJ_HAS_ATTRS != 0 {
            obj.attrs = self.attrs()?;
        }

        obj.kind = match obj_type {
            ObjType::Undefined => ObjectKind::Undefined,
            ObjType::Poly => ObjectKind::Poly(self.poly_list()?),
            ObjType::Numeric => ObjectKind::Numeric(self.f64()?),
            ObjType::Point => ObjectKind::Point(self.f64s()?),
            ObjType::Vector => ObjectKind::Vector(self.f64s()?),
            ObjType::Plane => ObjectKind::Plane(self.f64s()?),
            ObjType::CtlPt => {
                let (code, _) = self.header()?;
                let point_type = PointType::from_code(code)?;
                let coords = (0..point_type.coord_count())
                    .map(|_| self.f64())
                    .collect::<Result<Vec<_>>>()?;
                ObjectKind::CtlPt(CtlPt::new(point_type, coords)?)
            }
            ObjType::Matrix => ObjectKind::Matrix(mat_from_rows(&self.f64s()?)),
            ObjType::Instance => {
                let target = self.string()?;
                let mat = mat_from_rows(&self.f64s()?);
                ObjectKind::Instance(Instance { target, mat })
            }
            ObjType::String => ObjectKind::String(self.string()?),
            ObjType::List => {
                self.expect(AUX_OLST)?;
                let (count, _) = self.header()?;
                let mut children = Vec::with_capacity((count as usize).min(MAX_PREALLOC));
                for _ in 0..count {
                    children.push(self.object_record()?);
                }
                self.end("object")?;
                ObjectKind::List(children)
            }
            ObjType::Curve => ObjectKind::Curve(self.chain(AUX_CURVE, "curve", Self::curve)?),
            ObjType::Surface => ObjectKind::Surface(self.chain(AUX_SURFACE, "surface", Self::surface)?),
            ObjType::TrimSrf => ObjectKind::TrimSrf(self.chain(AUX_TRIMSRF, "trimmed surface", Self::trimsrf)?),
            ObjType::Trivar => ObjectKind::Trivar(self.chain(AUX_TRIVAR, "trivariate", Self::trivar)?),
            ObjType::TriSrf => ObjectKind::TriSrf(self.chain(AUX_TRISRF, "triangular surface", Self::trisrf)?),
            ObjType::Model => ObjectKind::Model(self.chain(AUX_MDL_TSRF, "model", Self::model)?),
            ObjType::Multivar => ObjectKind::Multivar(self.chain(AUX_MULTIVAR, "multivariate", Self::multivar)?),
        };
        Ok(obj)
    }

    fn chain<T>(
        &mut self,
        marker: u32,
        what: &'static str,
        mut f: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let (count, _) = self.header()?;
        let mut out = Vec::with_capacity((count as usize).min(MAX_PREALLOC));
        for _ in 0..count {
            self.expect(marker)?;
            out.push(f(self)?);
        }
        self.end(what)?;
        Ok(out)
    }

    fn attrs(&mut self) -> Result<Attributes> {
        let mut attrs = Attributes::new();
        loop {
            match self.sync()? {
                AUX_END => return Ok(attrs),
                AUX_ATTR => {}
                _ => return Err(BinaryError::Unterminated("attribute").into()),
            }
            let name = self.string()?;
            let (tag, _) = self.header()?;
            let value = match tag {
                ATTR_INT => {
                    let v = self.i32()?;
                    self.i32()?;
                    AttrValue::Int(v)
                }
                ATTR_REAL => AttrValue::Real(self.f64()?),
                ATTR_UV => AttrValue::Uv([self.f32()?, self.f32()?]),
                ATTR_STR => AttrValue::Str(self.string()?),
                ATTR_OBJECT => AttrValue::Object(Box::new(self.object_record()?)),
                _ => return Err(Error::invalid(format!("unknown attribute value tag {tag}"))),
            };
            attrs.set(name, value);
        }
    }

    fn poly_list(&mut self) -> Result<PolyList> {
        let (code, count) = self.header()?;
        let kind = PolyKind::from_code(code).ok_or_else(|| Error::invalid(format!("unknown polygon kind {code}")))?;
        let mut polys = Vec::with_capacity((count as usize).min(MAX_PREALLOC));
        for _ in 0..count {
            self.expect(AUX_POLY)?;
            let (flags, nverts) = self.header()?;
            let plane: [f64; 4] = self.f64s()?;
            let mut poly = Polygon {
                plane: (flags & POLY_HAS_PLANE != 0).then_some(plane),
                circular: flags & POLY_CIRCULAR != 0,
                ..Default::default()
            };
            if flags & POLY_HAS_ATTRS != 0 {
                poly.attrs = self.attrs()?;
            }
            for _ in 0..nverts {
                poly.vertices.push(self.vertex()?);
            }
            polys.push(poly);
        }
        self.end("polygon")?;
        Ok(PolyList::new(kind, polys))
    }

    fn vertex(&mut self) -> Result<Vertex> {
        self.expect(AUX_VERTEX)?;
        let (flags, _) = self.header()?;
        let mut v = Vertex::new(self.f64s()?);
        if flags & VERTEX_HAS_NORMAL != 0 {
            v.normal = Some(self.f64s()?);
        }
        v.internal = flags & VERTEX_INTERNAL != 0;
        if flags & VERTEX_HAS_ATTRS != 0 {
            v.attrs = self.attrs()?;
        }
        Ok(v)
    }

    // ========================================================================
    // Geometry records
    // ========================================================================

    fn geom_header(&mut self) -> Result<(GeomType, PointType)> {
        let (geom, pt) = self.header()?;
        Ok((GeomType::from_code(geom)?, PointType::from_code(pt)?))
    }

    fn axis(&mut self) -> Result<ParamAxis> {
        let (length, order) = self.header()?;
        let (periodic, has_knots) = self.header()?;
        let knots = if Self::flag(has_knots)? { Some(self.reals()?) } else { None };
        Ok(ParamAxis {
            length: length as usize,
            order: order as usize,
            periodic: Self::flag(periodic)?,
            knots,
        })
    }

    fn mesh(&mut self, point_type: PointType) -> Result<ControlMesh> {
        let mut coords: [Option<Vec<f64>>; MAX_PT_SIZE] = Default::default();
        for slot in point_type.first_slot()..=point_type.dim() {
            coords[slot] = Some(self.reals()?);
        }
        Ok(ControlMesh { point_type, coords })
    }

    fn curve(&mut self) -> Result<Curve> {
        let (geom, pt) = self.geom_header()?;
        let axis = self.axis()?;
        let mesh = self.mesh(pt)?;
        Curve::new(geom, axis, mesh)
    }

    fn surface(&mut self) -> Result<Surface> {
        let (geom, pt) = self.geom_header()?;
        let axes = [self.axis()?, self.axis()?];
        let mesh = self.mesh(pt)?;
        Surface::new(geom, axes, mesh)
    }

    fn trivar(&mut self) -> Result<Trivar> {
        let (geom, pt) = self.geom_header()?;
        let axes = [self.axis()?, self.axis()?, self.axis()?];
        let mesh = self.mesh(pt)?;
        Trivar::new(geom, axes, mesh)
    }

    fn multivar(&mut self) -> Result<Multivar> {
        let (geom, pt) = self.geom_header()?;
        let (dim, _) = self.header()?;
        let axes = (0..dim).map(|_| self.axis()).collect::<Result<Vec<_>>>()?;
        let mesh = self.mesh(pt)?;
        Multivar::new(geom, axes, mesh)
    }

    fn trisrf(&mut self) -> Result<TriSrf> {
        let (geom, pt) = self.geom_header()?;
        let (length, order) = self.header()?;
        let (has_knots, _) = self.header()?;
        let knots = if Self::flag(has_knots)? { Some(self.reals()?) } else { None };
        let mesh = self.mesh(pt)?;
        TriSrf::new(geom, length as usize, order as usize, knots, mesh)
    }

    fn trimsrf(&mut self) -> Result<TrimSrf> {
        self.expect(AUX_SURFACE)?;
        let srf = self.surface()?;
        let trim_crvs = self.chain(AUX_TRIMCRV, "trimming curve", |r| {
            let segs = r.chain(AUX_TRIMSEG, "trimming segment", |r| {
                let has_euc = r.header()?.0;
                let uv_crv = r.curve()?;
                let euc_crv = if Self::flag(has_euc)? { Some(r.curve()?) } else { None };
                Ok(TrimCrvSeg { uv_crv, euc_crv })
            })?;
            Ok(TrimCrv { segs })
        })?;
        Ok(TrimSrf::new(srf, trim_crvs))
    }

    /// Surfaces come first with loops of raw segment positions, then the
    /// segments with raw surface positions; the builder resolves both once
    /// the model is complete.
    fn model(&mut self) -> Result<Model> {
        let (num_srfs, num_segs) = self.header()?;
        let mut builder = ModelBuilder::new();

        for _ in 0..num_srfs {
            self.expect(AUX_SURFACE)?;
            let srf = self.surface()?;
            let (num_loops, _) = self.header()?;
            let mut loops = Vec::new();
            for _ in 0..num_loops {
                self.expect(AUX_MDL_LOOP)?;
                let n = self.u32()? as usize;
                let mut refs = Vec::with_capacity(n.min(MAX_PREALLOC));
                for _ in 0..n {
                    refs.push(self.i32()?);
                }
                self.skip(pad_to_align(4 * (n + 1), RECORD_ALIGN))?;
                loops.push(refs);
            }
            self.end("model loop")?;
            builder.push_srf(srf, loops);
        }
        self.end("model surface")?;

        for _ in 0..num_segs {
            self.expect(AUX_MDL_TSEG)?;
            let srf_first = self.i32()?;
            let srf_second = self.i32()?;
            let (mask, _) = self.header()?;
            let mut opt_curve = |bit: u32| -> Result<Option<Curve>> {
                if mask & bit != 0 { self.curve().map(Some) } else { Ok(None) }
            };
            let uv_crv_first = opt_curve(SEG_UV_FIRST)?;
            let uv_crv_second = opt_curve(SEG_UV_SECOND)?;
            let euc_crv = opt_curve(SEG_EUC)?;
            builder.push_seg(RawMdlTrimSeg { uv_crv_first, uv_crv_second, euc_crv, srf_first, srf_second });
        }
        self.end("model segment")?;

        builder.patch_trimming_seg_pointers()
    }
}
