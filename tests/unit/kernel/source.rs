use super::*;
use crate::domain::DomainDescriptor;

fn cylinder(expr: &str) -> SurfaceSpec {
    SurfaceSpec::cylindrical(
        DomainDescriptor::new(0.0, std::f64::consts::TAU, 4),
        DomainDescriptor::new(0.0, 10.0, 4),
        expr,
    )
}

#[test]
fn point_source_injects_expressions_literally() {
    let src = point_source(&cylinder("3.0 + sin(z)"));
    assert!(src.wgsl.contains("fn field(phi: f32, z: f32) -> f32 {\n    return 3.0 + sin(z);\n}"));
    assert!(src.wgsl.contains("fn to_cartesian(rho: f32, phi: f32, z: f32) -> vec3<f32> {"));
    assert!(src.wgsl.contains("return vec3(cos(phi) * rho, sin(phi) * rho, z);"));
    assert!(src.wgsl.contains("fn computePoints("));
    assert_eq!(src.label, "points:cylindrical");
}

#[test]
fn point_source_uses_zero_for_empty_field() {
    let src = point_source(&cylinder("   "));
    match &src.manifest {
        ProgramManifest::Points(m) => {
            assert_eq!(m.field, "0.0");
            assert_eq!(m.topology, Topology::Closed);
            assert_eq!(m.conversion_vars(), ["rho", "phi", "z"]);
        }
        other => panic!("unexpected manifest {other:?}"),
    }
}

#[test]
fn parametric_manifest_carries_conversion() {
    let spec = SurfaceSpec::parametric(
        DomainDescriptor::new(-1.0, 1.0, 2),
        DomainDescriptor::new(-1.0, 1.0, 2),
        "u * v",
        "vec3(u, r, v)",
    );
    let src = point_source(&spec);
    let ProgramManifest::Points(m) = &src.manifest else {
        panic!("expected a points manifest");
    };
    assert_eq!(m.axes, ["u", "v"]);
    assert_eq!(m.value, "r");
    assert_eq!(m.conversion, "vec3(u, r, v)");
    assert!(src.wgsl.contains("return u + v * stride;"));
}

#[test]
fn mesh_source_is_stable_and_topology_specific() {
    let open = mesh_source(Topology::Open);
    let closed = mesh_source(Topology::Closed);
    assert_eq!(open, mesh_source(Topology::Open));
    assert!(open.wgsl.contains("let stride = quads + 1u;"));
    assert!(closed.wgsl.contains("let stride = quads;"));
    assert!(closed.wgsl.contains("return (u % stride) + v * stride;"));
    assert_eq!(closed.manifest, ProgramManifest::Mesh { topology: Topology::Closed });
    assert!(closed.entry(MESH_ENTRY).is_some());
    assert!(closed.entry(POINTS_ENTRY).is_none());
}

#[test]
fn every_program_declares_the_launch_extent() {
    for src in [point_source(&cylinder("1.0")), mesh_source(Topology::Open)] {
        assert!(src.wgsl.contains("@group(1) @binding(0) var<uniform> launch: LaunchExtent;"));
        assert!(src.wgsl.contains("const pi: f32"));
    }
}
