//! End-to-end reading scenarios through the public entry points.

use cagd_io::prelude::*;
use cagd_io::util::approx_eq;

use glam::{DMat4, DVec3};

const SCENARIO_CURVE: &str = "[CURVE BSPLINE [4 3 E2 [KV 0 0 0 1 2 2 2] [0 0][1 1][2 0][3 1]]]";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn only_curve(obj: &Object) -> &Curve {
    match &obj.kind {
        ObjectKind::Curve(crvs) if crvs.len() == 1 => &crvs[0],
        other => panic!("expected a single curve, got {other:?}"),
    }
}

#[test]
fn test_scenario_bspline_curve() {
    init_tracing();
    let mut parser = Parser::new();
    let obj = parser.read_str(SCENARIO_CURVE).expect("parse curve");
    let crv = only_curve(&obj);

    assert_eq!(crv.geom_type, GeomType::Bspline);
    assert_eq!(crv.length(), 4);
    assert_eq!(crv.order(), 3);
    assert!(!crv.point_type().is_rational());
    assert_eq!(crv.point_type().dim(), 2);
    assert!(!crv.axis.periodic);
    assert_eq!(crv.axis.knots.as_deref(), Some(&[0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0][..]));
    assert_eq!(crv.mesh.point(3), vec![3.0, 1.0]);
}

#[test]
fn test_scenario_curve_rewrite() {
    init_tracing();
    let mut parser = Parser::new();
    let first = parser.read_str(SCENARIO_CURVE).expect("parse curve");

    let text = parser.write_string(std::slice::from_ref(&first)).expect("write curve");
    assert!(text.starts_with("[OBJECT"), "no indent, no comment expected:\n{text}");

    let second = parser.read_str(&text).expect("reparse curve");
    assert!(only_curve(&second).approx_eq(only_curve(&first), 1e-12));
}

#[test]
fn test_scenario_model_fixup() {
    init_tracing();
    let srf = "[SURFACE BEZIER 2 2 E3 [0 0 0] [1 0 0] [0 1 0] [1 1 0]]";
    let uv = "[CURVE BEZIER 2 E2 [0 0] [1 0]]";
    let text = format!(
        "[OBJECT shell [MODEL\n\
         [MDLTSRF {srf} [MDLLOOP 1 2 -3]]\n\
         [MDLTSRF {srf} [MDLLOOP -1 3]]\n\
         [MDLTSEG 0 1 {uv} {uv} NONE]\n\
         [MDLTSEG 0 -1 {uv} NONE NONE]\n\
         [MDLTSEG 1 -1 {uv} NONE NONE]]]"
    );

    let check = |obj: &Object| {
        let ObjectKind::Model(models) = &obj.kind else { panic!("expected a model, got {obj:?}") };
        let model = &models[0];
        assert_eq!(model.trim_srfs.len(), 2);
        assert_eq!(model.segs.len(), 3);

        let seg = &model.segs[2];
        assert_eq!(seg.srf_second, None);
        let first = seg.srf_first.expect("first surface");
        assert!(std::ptr::eq(model.srf(first).expect("resolved"), &model.trim_srfs[1]));

        let loop0 = &model.trim_srfs[0].loops[0];
        assert_eq!(loop0.seg_refs.len(), 3);
        assert!(loop0.seg_refs[2].reversed);
        assert!(std::ptr::eq(model.seg(loop0.seg_refs[2].seg).expect("segment"), seg));
    };

    let mut parser = Parser::new();
    let obj = parser.read_str(&text).expect("parse model");
    assert_eq!(obj.name(), "shell");
    check(&obj);

    // Same fix-up through the binary reader
    let bytes = parser.write_bytes(std::slice::from_ref(&obj)).expect("binary model");
    let back = parser.read_binary_bytes(&bytes).expect("read binary model");
    check(&back);
    assert_eq!(back, obj);
}

#[test]
fn test_scenario_degenerate_lists_collapse() {
    init_tracing();
    let crv = Curve::bezier(PointType::E2, &[[0.0, 0.0], [1.0, 1.0]]).expect("curve");
    let nested = Object::list(vec![Object::list(vec![Object::curve(crv.clone())])]);
    let text = Parser::new().write_string(&[nested]).expect("write nested");

    let mut flat = Parser::with_config(ParserConfig::new().with_flatten_tree(true).with_eliminate_degenerate(false));
    let obj = flat.read_str(&text).expect("flatten");
    assert_eq!(obj.children().len(), 1);
    assert_eq!(only_curve(&obj.children()[0]), &crv);

    let mut collapse = Parser::with_config(ParserConfig::new().with_flatten_tree(true));
    let obj = collapse.read_str(&text).expect("collapse");
    assert_eq!(only_curve(&obj), &crv);
}

fn unit_cube() -> Object {
    let c = |i: usize| [(i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64];
    let faces = [[0, 2, 3, 1], [4, 5, 7, 6], [0, 1, 5, 4], [2, 6, 7, 3], [0, 4, 6, 2], [1, 3, 7, 5]];
    let polys = faces
        .iter()
        .map(|&f| Polygon::from_coords(&f.map(c)))
        .collect();
    Object::polygons(polys).with_name("Foo")
}

#[test]
fn test_scenario_instance_resolution() {
    init_tracing();
    let scene = [
        unit_cube(),
        Object::instance("Foo", DMat4::from_scale(DVec3::splat(2.0))).with_name("Foo"),
    ];
    let mut parser = Parser::new();
    let text = parser.write_string(&scene).expect("write scene");
    let obj = parser.read_str(&text).expect("read scene");

    let [original, copy] = obj.children() else { panic!("expected two objects, got {obj:?}") };
    assert!(!original.is_instance_derived());
    assert!(copy.is_instance_derived());
    assert_eq!(copy.name(), "Foo");

    let (ObjectKind::Poly(orig), ObjectKind::Poly(scaled)) = (&original.kind, &copy.kind) else {
        panic!("instance did not resolve to polygons: {copy:?}");
    };
    assert_eq!(scaled.polys.len(), 6);
    for (p, q) in orig.polys.iter().zip(&scaled.polys) {
        for (u, v) in p.vertices.iter().zip(&q.vertices) {
            for k in 0..3 {
                assert!(approx_eq(v.coord[k], 2.0 * u.coord[k], 1e-12));
            }
        }
    }
}

#[test]
fn test_attributes_flow_to_leaves() {
    init_tracing();
    let text = "[OBJECT scene [color 3]\n\
                  [OBJECT part [width 0.5] [POINT 1 2 3]]\n\
                  [OBJECT other [color 9] [NUMBER 1]]]";
    let mut parser = Parser::with_config(ParserConfig::new().with_flatten_tree(true));
    let obj = parser.read_str(text).expect("read");
    let [part, other] = obj.children() else { panic!("expected two leaves, got {obj:?}") };
    assert_eq!(part.attrs.get_int("color"), Some(3));
    assert_eq!(part.attrs.get_real("width"), Some(0.5));
    assert_eq!(other.attrs.get_int("color"), Some(9));
}

#[test]
fn test_error_lines_reported() {
    init_tracing();
    let mut parser = Parser::new();
    let lines = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = lines.clone();
    parser.set_error_handler(Box::new(move |e: &Error| sink.borrow_mut().push((e.kind(), e.line()))));

    let err = parser.read_str("[OBJECT a\n[POINT 1 2 3]\n[NUMBER 1]]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntactic);
    assert_eq!(*lines.borrow(), [(ErrorKind::Syntactic, Some(3))]);

    let err = parser.read_str("[OBJECT a [NUMBER 1]]\u{1}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lexical);
}

const IDENTITY: &str = "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1";

#[test]
fn test_self_instancing_fan_out_terminates() {
    init_tracing();
    let text = format!(
        "[OBJECT A\n\
         [OBJECT x [INSTANCE A {IDENTITY}]]\n\
         [OBJECT y [INSTANCE A {IDENTITY}]]]"
    );
    let obj = Parser::new().read_str(&text).expect("read self-instancing scene");
    assert_eq!(obj.name(), "A");
    for holder in ["x", "y"] {
        let holder = obj.find(holder).expect("holder");
        let [copy] = holder.children() else { panic!("expected one copy, got {holder:?}") };
        assert!(copy.is_instance_derived());
    }
}

#[test]
fn test_oversized_text_counts_are_errors() {
    init_tracing();
    let mut parser = Parser::new();
    parser.set_error_handler(Box::new(|_| {}));
    for text in [
        "[TRISRF BEZIER 2000000000 E3 [0 0 0]]",
        "[OBJECT big [MULTIVAR BEZIER 2 2000000000 2000000000 E3 [0 0 0]]]",
        "[OBJECT P [POLYGON 2000000000 [0 0 0]]]",
    ] {
        let err = parser.read_str(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntactic, "{text}: {err}");
    }
}
