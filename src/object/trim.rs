//! Trimmed surfaces and models.
//!
//! A [`Model`] owns its trimmed surfaces and a global list of trimming
//! segments. Segments refer to surfaces, and loops refer to segments, through
//! arena-relative handles ([`SrfId`], [`SegId`]). The file formats carry plain
//! list positions instead; readers collect those into a [`ModelBuilder`] and
//! turn them into handles in one pass once the whole model has been read.

use super::{Curve, Surface};
use crate::util::{DMat4, Error, Result};

/// A segment of a trimming curve: a curve in the surface's parameter space,
/// optionally paired with its Euclidean image.
#[derive(Clone, Debug, PartialEq)]
pub struct TrimCrvSeg {
    pub uv_crv: Curve,
    pub euc_crv: Option<Curve>,
}

/// A closed trimming curve made of segments.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct TrimCrv {
    pub segs: Vec<TrimCrvSeg>,
}

/// A surface restricted by trimming curves.
#[derive(Clone, Debug, PartialEq)]
pub struct TrimSrf {
    pub srf: Surface,
    pub trim_crvs: Vec<TrimCrv>,
}

impl TrimSrf {
    pub fn new(srf: Surface, trim_crvs: Vec<TrimCrv>) -> Self {
        Self { srf, trim_crvs }
    }

    pub fn validate(&self) -> Result<()> {
        self.srf.validate()?;
        for seg in self.trim_crvs.iter().flat_map(|c| &c.segs) {
            seg.uv_crv.validate()?;
            if let Some(euc) = &seg.euc_crv {
                euc.validate()?;
            }
        }
        Ok(())
    }

    pub fn transform(&mut self, mat: &DMat4) {
        self.srf.mesh.transform(mat);
        for seg in self.trim_crvs.iter_mut().flat_map(|c| &mut c.segs) {
            if let Some(euc) = seg.euc_crv.as_mut() {
                euc.mesh.transform(mat);
            }
        }
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.srf.approx_eq(&other.srf, eps)
            && self.trim_crvs.len() == other.trim_crvs.len()
            && self.trim_crvs.iter().zip(&other.trim_crvs).all(|(a, b)| {
                a.segs.len() == b.segs.len()
                    && a.segs.iter().zip(&b.segs).all(|(x, y)| {
                        x.uv_crv.approx_eq(&y.uv_crv, eps)
                            && opt_crv_approx_eq(&x.euc_crv, &y.euc_crv, eps)
                    })
            })
    }
}

fn opt_crv_approx_eq(a: &Option<Curve>, b: &Option<Curve>, eps: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.approx_eq(b, eps),
        (None, None) => true,
        _ => false,
    }
}

/// Handle of a trimmed surface inside its model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SrfId(pub u32);

/// Handle of a trimming segment inside its model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegId(pub u32);

/// Oriented reference from a loop to a model segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegRef {
    pub seg: SegId,
    pub reversed: bool,
}

impl SegRef {
    /// Wire form: 1-based position, negated when reversed.
    pub fn to_wire(self) -> i32 {
        let pos = self.seg.0 as i32 + 1;
        if self.reversed { -pos } else { pos }
    }
}

/// A closed loop of oriented segment references.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MdlLoop {
    pub seg_refs: Vec<SegRef>,
}

/// A surface of a model with its trimming loops.
#[derive(Clone, Debug, PartialEq)]
pub struct MdlTrimSrf {
    pub srf: Surface,
    pub loops: Vec<MdlLoop>,
}

/// A trimming segment shared by up to two surfaces.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MdlTrimSeg {
    pub uv_crv_first: Option<Curve>,
    pub uv_crv_second: Option<Curve>,
    pub euc_crv: Option<Curve>,
    pub srf_first: Option<SrfId>,
    pub srf_second: Option<SrfId>,
}

/// Trimmed surfaces sharing a global list of trimming segments.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Model {
    pub trim_srfs: Vec<MdlTrimSrf>,
    pub segs: Vec<MdlTrimSeg>,
}

impl Model {
    /// Resolve a surface handle.
    pub fn srf(&self, id: SrfId) -> Option<&MdlTrimSrf> {
        self.trim_srfs.get(id.0 as usize)
    }

    /// Resolve a segment handle.
    pub fn seg(&self, id: SegId) -> Option<&MdlTrimSeg> {
        self.segs.get(id.0 as usize)
    }

    /// Wire index of an optional surface handle (`-1` for none).
    pub fn srf_index(id: Option<SrfId>) -> i32 {
        id.map_or(-1, |s| s.0 as i32)
    }

    /// Check that every handle resolves and every curve is valid.
    pub fn validate(&self) -> Result<()> {
        for ts in &self.trim_srfs {
            ts.srf.validate()?;
            for r in ts.loops.iter().flat_map(|l| &l.seg_refs) {
                if self.seg(r.seg).is_none() {
                    return Err(Error::invalid(format!("loop refers to missing segment {}", r.seg.0)));
                }
            }
        }
        for seg in &self.segs {
            for id in [seg.srf_first, seg.srf_second].into_iter().flatten() {
                if self.srf(id).is_none() {
                    return Err(Error::invalid(format!("segment refers to missing surface {}", id.0)));
                }
            }
            for crv in [&seg.uv_crv_first, &seg.uv_crv_second, &seg.euc_crv].into_iter().flatten() {
                crv.validate()?;
            }
        }
        Ok(())
    }

    pub fn transform(&mut self, mat: &DMat4) {
        for ts in &mut self.trim_srfs {
            ts.srf.mesh.transform(mat);
        }
        for seg in &mut self.segs {
            if let Some(euc) = seg.euc_crv.as_mut() {
                euc.mesh.transform(mat);
            }
        }
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.trim_srfs.len() == other.trim_srfs.len()
            && self.segs.len() == other.segs.len()
            && self.trim_srfs.iter().zip(&other.trim_srfs).all(|(a, b)| {
                a.srf.approx_eq(&b.srf, eps) && a.loops == b.loops
            })
            && self.segs.iter().zip(&other.segs).all(|(a, b)| {
                a.srf_first == b.srf_first
                    && a.srf_second == b.srf_second
                    && opt_crv_approx_eq(&a.uv_crv_first, &b.uv_crv_first, eps)
                    && opt_crv_approx_eq(&a.uv_crv_second, &b.uv_crv_second, eps)
                    && opt_crv_approx_eq(&a.euc_crv, &b.euc_crv, eps)
            })
    }
}

/// A segment as read from a file, with raw surface positions.
#[derive(Clone, Debug, Default)]
pub struct RawMdlTrimSeg {
    pub uv_crv_first: Option<Curve>,
    pub uv_crv_second: Option<Curve>,
    pub euc_crv: Option<Curve>,
    pub srf_first: i32,
    pub srf_second: i32,
}

/// Model under construction: surfaces and segments are stored in read order
/// and cross references are still raw file positions.
#[derive(Clone, Debug, Default)]
pub struct ModelBuilder {
    srfs: Vec<(Surface, Vec<Vec<i32>>)>,
    segs: Vec<RawMdlTrimSeg>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a surface with its loops given as 1-based signed segment positions.
    pub fn push_srf(&mut self, srf: Surface, loops: Vec<Vec<i32>>) {
        self.srfs.push((srf, loops));
    }

    pub fn push_seg(&mut self, seg: RawMdlTrimSeg) {
        self.segs.push(seg);
    }

    /// Replace every raw position by a handle, once all surfaces and
    /// segments exist. Negative surface positions mean "no surface".
    pub fn patch_trimming_seg_pointers(self) -> Result<Model> {
        let num_srfs = self.srfs.len();
        let num_segs = self.segs.len();

        let srf_id = |idx: i32| -> Result<Option<SrfId>> {
            if idx < 0 {
                Ok(None)
            } else if (idx as usize) < num_srfs {
                Ok(Some(SrfId(idx as u32)))
            } else {
                Err(Error::invalid(format!(
                    "trimming segment refers to surface {idx}, model has {num_srfs}"
                )))
            }
        };

        let segs = self
            .segs
            .into_iter()
            .map(|raw| {
                Ok(MdlTrimSeg {
                    srf_first: srf_id(raw.srf_first)?,
                    srf_second: srf_id(raw.srf_second)?,
                    uv_crv_first: raw.uv_crv_first,
                    uv_crv_second: raw.uv_crv_second,
                    euc_crv: raw.euc_crv,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let trim_srfs = self
            .srfs
            .into_iter()
            .map(|(srf, raw_loops)| {
                let loops = raw_loops
                    .into_iter()
                    .map(|refs| {
                        let seg_refs = refs
                            .into_iter()
                            .map(|r| {
                                let pos = r.unsigned_abs() as usize;
                                if pos == 0 || pos > num_segs {
                                    return Err(Error::invalid(format!(
                                        "loop refers to segment {r}, model has {num_segs}"
                                    )));
                                }
                                Ok(SegRef { seg: SegId(pos as u32 - 1), reversed: r < 0 })
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(MdlLoop { seg_refs })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(MdlTrimSrf { srf, loops })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Model { trim_srfs, segs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::PointType;

    fn unit_patch() -> Surface {
        let pts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        Surface::bezier(2, 2, PointType::E3, &pts).unwrap()
    }

    fn uv_line() -> Curve {
        Curve::bezier(PointType::E2, &[[0.0, 0.0], [1.0, 0.0]]).unwrap()
    }

    #[test]
    fn test_patch_resolves_surface_indices() {
        let mut builder = ModelBuilder::new();
        builder.push_srf(unit_patch(), vec![vec![1, 2, -3]]);
        builder.push_srf(unit_patch(), vec![]);
        for (first, second) in [(0, 1), (0, -1), (1, -1)] {
            builder.push_seg(RawMdlTrimSeg {
                uv_crv_first: Some(uv_line()),
                srf_first: first,
                srf_second: second,
                ..Default::default()
            });
        }

        let model = builder.patch_trimming_seg_pointers().unwrap();
        let seg = &model.segs[2];
        assert_eq!(seg.srf_second, None);
        let first = model.srf(seg.srf_first.unwrap()).unwrap();
        assert!(std::ptr::eq(first, &model.trim_srfs[1]));

        let refs = &model.trim_srfs[0].loops[0].seg_refs;
        assert_eq!(refs[2], SegRef { seg: SegId(2), reversed: true });
        assert_eq!(refs[2].to_wire(), -3);
        model.validate().unwrap();
    }

    #[test]
    fn test_patch_rejects_bad_indices() {
        let mut builder = ModelBuilder::new();
        builder.push_srf(unit_patch(), vec![]);
        builder.push_seg(RawMdlTrimSeg { srf_first: 3, srf_second: -1, ..Default::default() });
        assert!(builder.patch_trimming_seg_pointers().is_err());

        let mut builder = ModelBuilder::new();
        builder.push_srf(unit_patch(), vec![vec![0]]);
        assert!(builder.patch_trimming_seg_pointers().is_err());
    }
}
