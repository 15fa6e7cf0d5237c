//! The binary format.
//!
//! A stream is a sequence of sync-prefixed object records. Readers accept
//! either byte order and detect it from the first sync word; writers produce
//! the order asked for in [`Endian`].

pub mod format;
pub mod reader;
pub mod writer;

pub use reader::{BinaryReader, LeafHook};
pub use writer::BinaryWriter;

use byteorder::{BigEndian, LittleEndian};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::object::Object;
use crate::stream::{StreamHandle, StreamManager};
use crate::util::Result;

/// Byte order of written binary streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Endian {
    #[default]
    Native,
    /// Opposite of the host order.
    Swapped,
    Little,
    Big,
}

impl Endian {
    /// Whether this order is little endian on the current host.
    pub fn is_little(self) -> bool {
        let native_little = cfg!(target_endian = "little");
        match self {
            Self::Native => native_little,
            Self::Swapped => !native_little,
            Self::Little => true,
            Self::Big => false,
        }
    }
}

/// Render objects as binary records.
pub fn to_bytes(objects: &[Object], order: Endian) -> Result<Vec<u8>> {
    fn render<E: byteorder::ByteOrder>(objects: &[Object]) -> Result<Vec<u8>> {
        let mut w = BinaryWriter::<E>::new();
        for obj in objects {
            w.object(obj)?;
        }
        Ok(w.into_bytes())
    }

    if order.is_little() {
        render::<LittleEndian>(objects)
    } else {
        render::<BigEndian>(objects)
    }
}

/// Read the objects of a binary stream into a list object. In `single` mode
/// reading stops after the first object.
pub fn read_objects(
    streams: &mut StreamManager,
    handle: StreamHandle,
    single: bool,
    hook: Option<&mut LeafHook<'_>>,
) -> Result<Object> {
    let stream = streams.reader(handle)?;
    BinaryReader::new(stream).read_all(single, hook)
}

/// Write objects as binary records.
pub fn write_objects(streams: &mut StreamManager, handle: StreamHandle, objects: &[Object], order: Endian) -> Result<()> {
    let bytes = to_bytes(objects, order)?;
    let stream = streams.writer(handle)?;
    stream.write_bytes(&bytes)?;
    std::io::Write::flush(stream)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::*;
    use crate::stream::{StreamFlags, StreamFormat, StreamMode, StreamSource};
    use crate::util::{BinaryError, Error};

    fn read_back(bytes: Vec<u8>, single: bool) -> Result<Object> {
        let mut streams = StreamManager::new();
        let h = streams.open(StreamSource::Memory(bytes), StreamMode::Read, StreamFormat::Native, StreamFlags::binary())?;
        read_objects(&mut streams, h, single, None)
    }

    fn sample() -> Vec<Object> {
        let crv = Curve::bspline(3, PointType::P3, &[
            [1.0, 0.0, 0.0, 0.0],
            [0.5, 0.5, 0.5, 0.0],
            [1.0, 1.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 1.0],
        ])
        .unwrap();
        let mut tri = Polygon::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        tri.plane = Some([0.0, 0.0, 1.0, 0.0]);
        tri.vertices[0].normal = Some([0.0, 0.0, 1.0]);
        tri.vertices[1].internal = true;
        tri.attrs.set("id", 3);

        vec![
            Object::curve(crv).with_name("c1").with_attr("color", 4).with_attr("w", 0.25),
            Object::list(vec![
                Object::polygons(vec![tri]).with_name("tri"),
                Object::new(ObjectKind::String("hi there".into())),
                Object::instance("c1", glam::DMat4::from_translation(glam::DVec3::new(1.0, 2.0, 3.0))),
            ])
            .with_name("grp")
            .with_attr("uv", AttrValue::Uv([0.5, 0.25])),
        ]
    }

    #[test]
    fn test_roundtrip_both_orders() {
        let objects = sample();
        for order in [Endian::Native, Endian::Swapped, Endian::Little, Endian::Big] {
            let back = read_back(to_bytes(&objects, order).unwrap(), false).unwrap();
            assert_eq!(back, Object::list(objects.clone()), "order {order:?}");
        }
    }

    #[test]
    fn test_single_mode() {
        let back = read_back(to_bytes(&sample(), Endian::Native).unwrap(), true).unwrap();
        assert_eq!(back.children().len(), 1);
        assert_eq!(back.children()[0].name(), "c1");
    }

    #[test]
    fn test_corrupt_sync() {
        let mut bytes = to_bytes(&sample(), Endian::Little).unwrap();
        bytes[0] ^= 0xFF;
        assert!(matches!(
            read_back(bytes, false),
            Err(Error::Binary(BinaryError::BadSync(_)))
        ));
    }

    #[test]
    fn test_truncated() {
        let mut bytes = to_bytes(&sample(), Endian::Native).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            read_back(bytes, false),
            Err(Error::Binary(BinaryError::Truncated))
        ));
    }

    #[test]
    fn test_corrupt_string_length() {
        let named = Object::new(ObjectKind::Numeric(1.0)).with_name("n");
        let mut bytes = to_bytes(&[named], Endian::Little).unwrap();
        // sync, flags, reserved, string marker, then the name length
        bytes[16..20].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        assert!(matches!(
            read_back(bytes, false),
            Err(Error::Binary(BinaryError::Truncated))
        ));
    }

    #[test]
    fn test_stops_at_framing_marker() {
        let mut bytes = to_bytes(&[Object::new(ObjectKind::Numeric(1.0))], Endian::Native).unwrap();
        bytes.extend_from_slice(&format::make_sync(format::AUX_END).to_ne_bytes());
        bytes.extend(to_bytes(&[Object::new(ObjectKind::Numeric(2.0))], Endian::Native).unwrap());

        let mut streams = StreamManager::new();
        let h = streams
            .open(StreamSource::Memory(bytes), StreamMode::Read, StreamFormat::Native, StreamFlags::binary())
            .unwrap();
        let first = read_objects(&mut streams, h, false, None).unwrap();
        assert_eq!(first.children().len(), 1);
        // the marker stays pending
        let again = read_objects(&mut streams, h, false, None).unwrap();
        assert!(again.children().is_empty());
    }

    #[test]
    fn test_leaf_hook_filters() {
        let bytes = to_bytes(&sample(), Endian::Native).unwrap();
        let mut streams = StreamManager::new();
        let h = streams
            .open(StreamSource::Memory(bytes), StreamMode::Read, StreamFormat::Native, StreamFlags::binary())
            .unwrap();
        let mut seen = Vec::new();
        let mut hook = |o: Object| {
            seen.push(o.name().to_string());
            o.is_list().then_some(o)
        };
        let back = read_objects(&mut streams, h, false, Some(&mut hook)).unwrap();
        assert_eq!(seen, ["c1", "grp"]);
        assert_eq!(back.children().len(), 1);
        assert!(back.children()[0].is_list());
    }
}
