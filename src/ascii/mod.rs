//! The text format.
//!
//! Entry points come in two shapes: the stream form works on a handle that
//! the caller opened (and keeps open), the file form opens, reads or writes and
//! closes its own stream.

pub mod reader;
pub mod writer;

pub use reader::AsciiReader;
pub use writer::AsciiWriter;

use std::path::Path;

use crate::config::ParserConfig;
use crate::object::*;
use crate::stream::{StreamFlags, StreamFormat, StreamHandle, StreamManager, StreamMode, StreamSource};
use crate::util::{Error, Result};

/// Read every top-level form of a text stream into a list object.
pub fn read_objects(streams: &mut StreamManager, handle: StreamHandle, config: &ParserConfig) -> Result<Object> {
    let stream = streams.reader(handle)?;
    AsciiReader::new(stream).with_circular(config.poly_list_circular).read_all()
}

/// Write objects as top-level forms, preceded by an optional comment block.
pub fn write_objects(
    streams: &mut StreamManager,
    handle: StreamHandle,
    objects: &[Object],
    indent: usize,
    comment: Option<&str>,
    config: &ParserConfig,
) -> Result<()> {
    let mut w = AsciiWriter::new(config);
    if let Some(c) = comment {
        w.comment(c);
    }
    for obj in objects {
        w.object(obj, indent)?;
    }
    w.finish(streams.writer(handle)?)
}

/// Render objects to a string.
pub fn to_string(objects: &[Object], config: &ParserConfig) -> Result<String> {
    let mut w = AsciiWriter::new(config);
    for obj in objects {
        w.object(obj, 0)?;
    }
    Ok(w.into_string())
}

fn read_path(path: &Path) -> Result<Object> {
    let mut streams = StreamManager::new();
    let h = streams.open(
        StreamSource::Path(path.to_path_buf()),
        StreamMode::Read,
        StreamFormat::Native,
        StreamFlags::text(),
    )?;
    let res = read_objects(&mut streams, h, &ParserConfig::default());
    streams.close(h, true)?;
    res
}

fn collect_kind<T>(obj: Object, expected: ObjType, take: &impl Fn(ObjectKind) -> Option<Vec<T>>, out: &mut Vec<T>) -> Result<()> {
    match obj.kind {
        ObjectKind::List(children) => {
            for c in children {
                collect_kind(c, expected, take, out)?;
            }
            Ok(())
        }
        kind => {
            let actual = kind.obj_type();
            let items = take(kind).ok_or_else(|| Error::kind_mismatch(expected.name(), actual.name()))?;
            out.extend(items);
            Ok(())
        }
    }
}

macro_rules! file_readers {
    ($($(#[$doc:meta])* $name:ident => $variant:ident($ty:ty);)*) => {$(
        $(#[$doc])*
        pub fn $name(path: impl AsRef<Path>) -> Result<Vec<$ty>> {
            let mut out = Vec::new();
            let take = |kind: ObjectKind| match kind {
                ObjectKind::$variant(v) => Some(v),
                _ => None,
            };
            collect_kind(read_path(path.as_ref())?, ObjType::$variant, &take, &mut out)?;
            Ok(out)
        }
    )*};
}

file_readers! {
    /// Every curve of a text file.
    curves_from_file => Curve(Curve);
    /// Every surface of a text file.
    surfaces_from_file => Surface(Surface);
    trimsrfs_from_file => TrimSrf(TrimSrf);
    trivars_from_file => Trivar(Trivar);
    trisrfs_from_file => TriSrf(TriSrf);
    models_from_file => Model(Model);
    multivars_from_file => Multivar(Multivar);
}

/// Write objects to a text file, replacing it.
pub fn write_file(path: impl AsRef<Path>, objects: &[Object], comment: Option<&str>, config: &ParserConfig) -> Result<()> {
    let mut streams = StreamManager::new();
    let h = streams.open(
        StreamSource::Path(path.as_ref().to_path_buf()),
        StreamMode::Write,
        StreamFormat::Native,
        StreamFlags::text(),
    )?;
    let res = write_objects(&mut streams, h, objects, 0, comment, config);
    streams.close(h, true)?;
    res
}

/// Write bare curve forms to a text file.
pub fn curves_to_file(path: impl AsRef<Path>, curves: &[Curve]) -> Result<()> {
    let mut w = AsciiWriter::default();
    for c in curves {
        w.curve(c, 0)?;
    }
    let mut streams = StreamManager::new();
    let h = streams.open(
        StreamSource::Path(path.as_ref().to_path_buf()),
        StreamMode::Write,
        StreamFormat::Native,
        StreamFlags::text(),
    )?;
    let res = w.finish(streams.writer(h)?);
    streams.close(h, true)?;
    res
}
