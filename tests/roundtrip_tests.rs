//! Integration tests for writing scenes in both formats and reading them back.

use cagd_io::binary::format::{make_sync, AUX_OLST};
use cagd_io::prelude::*;
use cagd_io::util::{mat_from_rows, BinaryError};

use glam::DMat4;
use tempfile::tempdir;

fn unit_patch() -> Surface {
    let pts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.5]];
    Surface::bezier(2, 2, PointType::E3, &pts).expect("patch")
}

fn uv_line(a: [f64; 2], b: [f64; 2]) -> Curve {
    Curve::bezier(PointType::E2, &[a, b]).expect("uv line")
}

fn sample_model() -> Model {
    let mut builder = ModelBuilder::new();
    builder.push_srf(unit_patch(), vec![vec![1, -2, 3]]);
    builder.push_srf(unit_patch(), vec![]);
    builder.push_seg(RawMdlTrimSeg {
        uv_crv_first: Some(uv_line([0.0, 0.0], [1.0, 0.0])),
        uv_crv_second: Some(uv_line([0.0, 1.0], [1.0, 1.0])),
        srf_first: 0,
        srf_second: 1,
        ..Default::default()
    });
    builder.push_seg(RawMdlTrimSeg {
        uv_crv_first: Some(uv_line([1.0, 0.0], [1.0, 1.0])),
        euc_crv: Some(Curve::bezier(PointType::E3, &[[1.0, 0.0, 0.0], [1.0, 1.0, 0.5]]).expect("euc")),
        srf_first: 0,
        srf_second: -1,
        ..Default::default()
    });
    builder.push_seg(RawMdlTrimSeg {
        uv_crv_first: Some(uv_line([1.0, 1.0], [0.0, 0.0])),
        srf_first: 1,
        srf_second: -1,
        ..Default::default()
    });
    builder.patch_trimming_seg_pointers().expect("model fix-up")
}

/// One object of every kind both formats carry.
fn sample_scene() -> Vec<Object> {
    let open = Curve::bspline(3, PointType::P3, &[
        [1.0, 0.0, 0.0, 0.0],
        [0.5, 0.25, 0.5, 0.0],
        [2.0, 2.0, 0.0, 1.0],
        [1.0, 1.0, 1.0, 1.0],
        [1.0, 3.0, 0.0, -1.5],
    ])
    .expect("open curve");

    let periodic_axis =
        ParamAxis::bspline(4, 3, true, (0..9).map(f64::from).collect()).expect("periodic axis");
    let periodic_mesh =
        ControlMesh::from_points(PointType::E2, &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).expect("mesh");
    let periodic = Curve::new(GeomType::Bspline, periodic_axis, periodic_mesh).expect("periodic curve");

    let bsp_srf = Surface::new(
        GeomType::Bspline,
        [ParamAxis::bspline_open(3, 2).expect("u"), ParamAxis::bspline_open(2, 2).expect("v")],
        ControlMesh::from_points(PointType::E3, &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.1],
            [2.0, 0.0, 0.0],
            [0.0, 1.0, 0.2],
            [1.0, 1.0, 0.3],
            [2.0, 1.0, 0.2],
        ])
        .expect("mesh"),
    )
    .expect("bspline surface");

    let trimmed = TrimSrf::new(unit_patch(), vec![TrimCrv {
        segs: vec![
            TrimCrvSeg { uv_crv: uv_line([0.1, 0.1], [0.9, 0.1]), euc_crv: None },
            TrimCrvSeg {
                uv_crv: uv_line([0.9, 0.1], [0.1, 0.1]),
                euc_crv: Some(Curve::bezier(PointType::E3, &[[0.9, 0.1, 0.0], [0.1, 0.1, 0.0]]).expect("euc")),
            },
        ],
    }]);

    let cube_pts: Vec<[f64; 3]> = (0..8)
        .map(|i| [(i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64])
        .collect();
    let trivar = Trivar::new(
        GeomType::Bezier,
        [ParamAxis::bezier(2), ParamAxis::bezier(2), ParamAxis::bezier(2)],
        ControlMesh::from_points(PointType::E3, &cube_pts).expect("mesh"),
    )
    .expect("trivar");

    let trisrf = TriSrf::new(
        GeomType::Bezier,
        2,
        2,
        None,
        ControlMesh::from_points(PointType::E3, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]).expect("mesh"),
    )
    .expect("trisrf");

    let multivar = Multivar::new(
        GeomType::Bezier,
        vec![ParamAxis::bezier(2), ParamAxis::bezier(2)],
        ControlMesh::from_points(PointType::E1, &[[0.0], [1.0], [2.0], [3.0]]).expect("mesh"),
    )
    .expect("multivar");

    let mut square = Polygon::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
    square.plane = Some([0.0, 0.0, 1.0, 0.0]);
    square.vertices[0].normal = Some([0.0, 0.0, 1.0]);
    square.vertices[2].internal = true;
    square.vertices[3].attrs.set("rgb", "255,0,0");
    square.attrs.set("id", 7);

    let rows: [f64; 16] = [1.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.5, -0.5, 0.25, 1.0];

    vec![
        Object::new(ObjectKind::Curve(vec![open, periodic]))
            .with_name("curves")
            .with_attr("color", 4)
            .with_attr("width", 0.125)
            .with_attr("uvvals", AttrValue::Uv([0.25, 0.75]))
            .with_attr("label", "two words"),
        Object::new(ObjectKind::Surface(vec![bsp_srf, unit_patch()])).with_name("srfs"),
        Object::new(ObjectKind::TrimSrf(vec![trimmed])).with_name("trimmed"),
        Object::new(ObjectKind::Trivar(vec![trivar])).with_name("volume"),
        Object::new(ObjectKind::TriSrf(vec![trisrf])).with_name("tri"),
        Object::new(ObjectKind::Model(vec![sample_model()])).with_name("model"),
        Object::new(ObjectKind::Multivar(vec![multivar])).with_name("mv"),
        Object::list(vec![
            Object::polygons(vec![square]).with_name("square"),
            Object::new(ObjectKind::Poly(PolyList::new(
                PolyKind::Polyline,
                vec![Polygon::from_coords(&[[0.0, 0.0, 0.0], [2.0, 1.0, 0.0]])],
            )))
            .with_name("path"),
            Object::new(ObjectKind::Numeric(-1.5e-3)).with_name("num"),
            Object::new(ObjectKind::Point([1.0, 2.0, 3.0])).with_name("pt"),
            Object::new(ObjectKind::Vector([0.0, -1.0, 0.0])).with_name("vec"),
            Object::new(ObjectKind::Plane([0.0, 1.0, 0.0, -2.0])).with_name("pln"),
            Object::new(ObjectKind::CtlPt(CtlPt::new(PointType::P2, vec![2.0, 1.0, 4.0]).expect("ctlpt")))
                .with_name("cp"),
            Object::new(ObjectKind::Matrix(mat_from_rows(&rows))).with_name("mat"),
            Object::new(ObjectKind::String("hello world".into())).with_name("str"),
            Object::instance("square", DMat4::from_scale(glam::DVec3::splat(2.0))).with_name("big"),
        ])
        .with_name("group")
        .with_attr("meta", Object::new(ObjectKind::Numeric(3.0)).with_name("m")),
    ]
}

fn assert_same(back: &Object, expected: &[Object]) {
    let expected = Object::list(expected.to_vec());
    assert!(
        back.approx_eq(&expected, 1e-12),
        "read back differs\nexpected: {expected:#?}\ngot: {back:#?}"
    );
}

#[test]
fn test_ascii_roundtrip() {
    let scene = sample_scene();
    let mut parser = Parser::with_config(ParserConfig::raw());
    let text = parser.write_string(&scene).expect("write text");
    let back = parser.read_str(&text).expect("read text");
    assert_same(&back, &scene);
}

#[test]
fn test_ascii_roundtrip_file_with_comment() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("scene.itd");
    let scene = sample_scene();

    let mut parser = Parser::with_config(ParserConfig::raw());
    parser
        .write_file(&scene, &path, Some("written by the round trip test\nsecond line"))
        .expect("write file");
    let text = std::fs::read_to_string(&path).expect("read file");
    assert!(text.starts_with("# written by the round trip test\n# second line\n"));

    let back = parser.read_file(&path).expect("read file back");
    assert_same(&back, &scene);
}

#[test]
fn test_binary_roundtrip_file() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("scene.ibd");
    let scene = sample_scene();

    let mut parser = Parser::with_config(ParserConfig::raw());
    parser.write_file(&scene, &path, None).expect("write binary");
    let back = parser.read_file(&path).expect("read binary");
    assert_eq!(back, Object::list(scene));
}

#[test]
fn test_binary_swapped_roundtrip() {
    let scene = sample_scene();
    let mut writer = Parser::with_config(ParserConfig::raw().with_byte_order(Endian::Swapped));
    let bytes = writer.write_bytes(&scene).expect("write swapped");

    let first = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    assert_eq!(first, make_sync(ObjType::Curve as u32).swap_bytes());

    let mut reader = Parser::with_config(ParserConfig::raw());
    let back = reader.read_binary_bytes(&bytes).expect("read swapped");
    assert_eq!(back, Object::list(scene));
}

#[test]
fn test_binary_and_text_agree() {
    let scene = sample_scene();
    let mut parser = Parser::with_config(ParserConfig::raw());
    let from_text = {
        let text = parser.write_string(&scene).expect("text");
        parser.read_str(&text).expect("read text")
    };
    let from_binary = {
        let bytes = parser.write_bytes(&scene).expect("binary");
        parser.read_binary_bytes(&bytes).expect("read binary")
    };
    assert!(from_text.approx_eq(&from_binary, 1e-12));
}

#[test]
fn test_size_field_corruption_detected() {
    let mut parser = Parser::with_config(ParserConfig::raw().with_byte_order(Endian::Little));
    let mut bytes = parser.write_bytes(&sample_scene()).expect("write");
    // little endian sync: kind, layout size, 0x16, 0x03
    bytes[1] ^= 0x01;
    let err = parser.read_binary_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::Binary(BinaryError::SizeMismatch { expected: 40, .. })), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::BinaryProtocol);
    assert_eq!(err.line(), None);
}

#[test]
fn test_unterminated_list_detected() {
    let mut parser = Parser::with_config(ParserConfig::raw().with_byte_order(Endian::Native));
    let group = sample_scene().pop().expect("group");
    let mut bytes = parser.write_bytes(&[group]).expect("write");
    // Replace the closing marker of the list with another list header
    let n = bytes.len();
    bytes[n - 4..].copy_from_slice(&make_sync(AUX_OLST).to_ne_bytes());
    let err = parser.read_binary_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::Binary(BinaryError::Unterminated(_))), "{err:?}");
}

#[test]
fn test_compressed_text_stream() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("scene.itd.gz");
    let scene = sample_scene();
    let mut parser = Parser::with_config(ParserConfig::raw());

    let h = parser
        .open(
            StreamSource::Path(path.clone()),
            StreamMode::Write,
            StreamFormat::Native,
            StreamFlags::text().with_compressed(true),
        )
        .expect("open for write");
    parser.write_objects(&scene, h, 0, None).expect("write");
    parser.close(h).expect("close");

    let raw = std::fs::read(&path).expect("raw bytes");
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);

    let h = parser
        .open(
            StreamSource::Path(path),
            StreamMode::Read,
            StreamFormat::Native,
            StreamFlags::text().with_compressed(true),
        )
        .expect("open for read");
    let back = parser.read_all_objects(h).expect("read");
    parser.close(h).expect("close");
    assert_same(&back, &scene);
}

#[test]
fn test_memory_channel_binary() {
    let scene = sample_scene();
    let channel = MemoryChannel::new();
    let mut parser = Parser::with_config(ParserConfig::raw());

    let h = parser
        .open(StreamSource::channel_writer(&channel), StreamMode::Write, StreamFormat::Native, StreamFlags::binary())
        .expect("open writer");
    parser.write_objects(&scene, h, 0, None).expect("write");
    parser.close(h).expect("close writer");
    channel.close();

    let h = parser
        .open(StreamSource::channel_reader(&channel), StreamMode::Read, StreamFormat::Native, StreamFlags::binary())
        .expect("open reader");
    let back = parser.read_all_objects(h).expect("read");
    parser.close(h).expect("close reader");
    assert_eq!(back, Object::list(scene));
    assert!(channel.is_empty());
}

#[test]
fn test_invalid_write_leaves_file_empty() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("bad.itd");
    let mut crv = uv_line([0.0, 0.0], [1.0, 1.0]);
    crv.mesh.coords[1] = Some(vec![0.0]);

    let mut parser = Parser::new();
    parser.set_error_handler(Box::new(|_| {}));
    let good = Object::new(ObjectKind::Numeric(1.0));
    assert!(parser.write_file(&[good, Object::curve(crv)], &path, None).is_err());
    assert_eq!(std::fs::read_to_string(&path).expect("file exists"), "");
}

#[test]
fn test_vertex_object_attribute_roundtrip() {
    let mut tri = Polygon::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    tri.vertices[0].normal = Some([0.0, 0.0, 1.0]);
    tri.vertices[1].attrs.set("id", 1);
    tri.vertices[1].attrs.set("tag", Object::curve(uv_line([0.0, 0.0], [1.0, 1.0])).with_name("guide"));
    tri.vertices[1].attrs.set("rgb", "0,255,0");
    tri.vertices[2].attrs.set("mark", Object::new(ObjectKind::Numeric(2.5)));
    let scene = [Object::polygons(vec![tri]).with_name("tri")];

    let mut parser = Parser::with_config(ParserConfig::raw());
    let text = parser.write_string(&scene).expect("write text");
    let from_text = parser.read_str(&text).expect("read text");
    assert_same(&from_text, &scene);

    let bytes = parser.write_bytes(&scene).expect("write binary");
    let from_binary = parser.read_binary_bytes(&bytes).expect("read binary");
    assert_eq!(from_binary, from_text);
}

#[test]
fn test_non_finite_attributes_roundtrip() {
    let obj = Object::new(ObjectKind::Numeric(0.0))
        .with_name("n")
        .with_attr("nan", f64::NAN)
        .with_attr("up", f64::INFINITY)
        .with_attr("down", f64::NEG_INFINITY);
    let mut parser = Parser::with_config(ParserConfig::raw());
    let text = parser.write_string(std::slice::from_ref(&obj)).expect("write");
    let back = parser.read_str(&text).expect("read");
    let attrs = &back.children()[0].attrs;
    assert!(attrs.get_real("nan").expect("nan").is_nan());
    assert_eq!(attrs.get_real("up"), Some(f64::INFINITY));
    assert_eq!(attrs.get_real("down"), Some(f64::NEG_INFINITY));
}

#[test]
fn test_knot_vector_lengths() {
    for order in 1..=5 {
        for length in order..order + 6 {
            let pts: Vec<[f64; 2]> = (0..length).map(|i| [i as f64, (i * i) as f64]).collect();
            let crv = Curve::bspline(order, PointType::E2, &pts).expect("bspline");
            assert_eq!(crv.axis.knots.as_ref().map(Vec::len), Some(order + length));
            assert_eq!(crv.axis.knot_len(), knot_vector_len(length, order, false));
        }
    }
    assert_eq!(knot_vector_len(4, 3, true), 9);

    let mut parser = Parser::new();
    parser.set_error_handler(Box::new(|_| {}));
    let err = parser
        .read_str("[CURVE BSPLINE 4 3 E2 [KV 0 0 0 1 2 2] [0 0][1 1][2 0][3 1]]")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntactic);
}
