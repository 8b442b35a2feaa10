use super::*;
use crate::domain::SurfaceKind;

#[test]
fn cylindrical_body_parses() {
    let req = SurfaceRequest::from_reader(
        r#"{"phi":{"min":0,"max":6.28,"res":8},"z":{"min":0,"max":1,"res":2},"expr":"1.0"}"#
            .as_bytes(),
    )
    .unwrap();
    let spec = req.into_spec();
    assert_eq!(spec.kind, SurfaceKind::Cylindrical);
    assert_eq!(spec.domains[0].res, 8);
    assert_eq!(spec.expr, "1.0");
}

#[test]
fn parametric_body_parses_with_default_conversion() {
    let req = SurfaceRequest::from_reader(
        r#"{"u":{"min":-1,"max":1,"res":4},"v":{"min":-1,"max":1,"res":4},"expr":"u*v"}"#
            .as_bytes(),
    )
    .unwrap();
    let spec = SurfaceSpec::from(req);
    assert_eq!(spec.kind, SurfaceKind::Parametric);
    assert_eq!(spec.conversion_expr(), "vec3(u, v, r)");
}

#[test]
fn mixed_shapes_are_rejected() {
    let err = SurfaceRequest::from_reader(
        r#"{"phi":{"min":0,"max":1,"res":1},"z":{"min":0,"max":1,"res":1},"conv":"vec3(1,2,3)"}"#
            .as_bytes(),
    )
    .unwrap_err();
    assert!(matches!(err, MeshError::Serde(_)));
}

#[test]
fn mesh_serializes_to_the_response_body() {
    let mesh = Mesh {
        vertices: vec![0.0; 9],
        normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
    };
    assert_eq!(mesh.triangle_count(), 1);
    let mut out = Vec::new();
    mesh.to_writer(&mut out).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["vertices"].as_array().unwrap().len(), 9);
    assert_eq!(value["normals"][2], 1.0);
}
