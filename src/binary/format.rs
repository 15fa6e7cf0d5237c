//! Binary format constants and the sync word.
//!
//! Every record starts with a 32-bit sync word:
//!
//! ```text
//! 0x03 0x16 LAYOUT_SIZE KIND      (as read in the writer's byte order)
//! ```
//!
//! The magic in the high half lets a reader detect a byte-swapped stream; the
//! layout size catches writers built with a different record layout. Kinds
//! below [`AUX_SEPARATOR`] are object kinds, the rest frame sub-records.

use crate::util::{BinaryError, Result};

/// Magic carried in the high half of every sync word.
pub const SYNC_MAGIC: u32 = 0x0316_0000;

/// Mask selecting the magic.
pub const SYNC_MAGIC_MASK: u32 = 0xFFFF_0000;

/// Size of the polygon header record (flags, vertex count and plane), which
/// identifies the record layout.
pub const LAYOUT_SIZE: u32 = 40;

/// Header records are padded to this alignment.
pub const RECORD_ALIGN: usize = 8;

/// Strings are padded to this alignment.
pub const STRING_ALIGN: usize = 4;

/// First kind that is not an object kind.
pub const AUX_SEPARATOR: u32 = 200;

pub const AUX_ATTR: u32 = 201;
pub const AUX_VERTEX: u32 = 202;
pub const AUX_POLY: u32 = 203;
pub const AUX_CURVE: u32 = 204;
pub const AUX_SURFACE: u32 = 205;
pub const AUX_TRIVAR: u32 = 206;
pub const AUX_TRISRF: u32 = 207;
pub const AUX_MULTIVAR: u32 = 208;
pub const AUX_TRIMSRF: u32 = 209;
pub const AUX_TRIMCRV: u32 = 210;
pub const AUX_TRIMSEG: u32 = 211;
pub const AUX_MDL_TSRF: u32 = 212;
pub const AUX_MDL_TSEG: u32 = 213;
pub const AUX_MDL_LOOP: u32 = 214;
pub const AUX_STRING: u32 = 215;
pub const AUX_OLST: u32 = 216;
/// Closes every variable-length sequence.
pub const AUX_END: u32 = 255;

// Object header flags
pub const OBJ_HAS_NAME: u32 = 1 << 0;
pub const OBJ_HAS_ATTRS: u32 = 1 << 1;

// Polygon header flags
pub const POLY_HAS_PLANE: u32 = 1 << 0;
pub const POLY_HAS_ATTRS: u32 = 1 << 1;
pub const POLY_CIRCULAR: u32 = 1 << 2;

// Vertex header flags
pub const VERTEX_HAS_NORMAL: u32 = 1 << 0;
pub const VERTEX_INTERNAL: u32 = 1 << 1;
pub const VERTEX_HAS_ATTRS: u32 = 1 << 2;

// Model segment curve mask
pub const SEG_UV_FIRST: u32 = 1 << 0;
pub const SEG_UV_SECOND: u32 = 1 << 1;
pub const SEG_EUC: u32 = 1 << 2;

// Attribute value tags
pub const ATTR_INT: u32 = 0;
pub const ATTR_REAL: u32 = 1;
pub const ATTR_UV: u32 = 2;
pub const ATTR_STR: u32 = 3;
pub const ATTR_OBJECT: u32 = 4;

/// Sync word for a record kind, in native order.
#[inline]
pub const fn make_sync(kind: u32) -> u32 {
    (kind & 0xFF) | SYNC_MAGIC | (LAYOUT_SIZE << 8)
}

/// Whether a word read without swapping carries the magic.
#[inline]
pub const fn has_magic(word: u32) -> bool {
    word & SYNC_MAGIC_MASK == SYNC_MAGIC
}

/// Decide the byte order of a stream from its first sync word.
/// Returns `true` when the stream must be byte-swapped.
pub fn detect_swap(raw: u32) -> Result<bool> {
    if has_magic(raw) {
        Ok(false)
    } else if has_magic(raw.swap_bytes()) {
        Ok(true)
    } else {
        Err(BinaryError::BadSync(raw).into())
    }
}

/// Check a sync word already brought into native order and return its kind.
pub fn decode_sync(word: u32) -> Result<u32> {
    if !has_magic(word) {
        return Err(BinaryError::BadSync(word).into());
    }
    let size = (word >> 8) & 0xFF;
    if size != LAYOUT_SIZE {
        return Err(BinaryError::SizeMismatch { expected: LAYOUT_SIZE, actual: size }.into());
    }
    Ok(word & 0xFF)
}

/// Bytes needed to pad `len` up to `align`.
#[inline]
pub const fn pad_to_align(len: usize, align: usize) -> usize {
    (align - len % align) % align
}

/// Whether a kind is a framing marker rather than an object.
#[inline]
pub const fn is_aux(kind: u32) -> bool {
    kind >= AUX_SEPARATOR
}
