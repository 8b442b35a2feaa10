use super::*;

#[test]
fn step_divides_interval_by_res() {
    let d = DomainDescriptor::new(0.0, 10.0, 4);
    assert_eq!(d.step(), 2.5);
}

#[test]
fn zero_res_is_rejected() {
    let err = DomainDescriptor::new(0.0, 1.0, 0).validate("u").unwrap_err();
    assert!(err.to_string().contains("'u' res must be >= 1"));
}

#[test]
fn non_finite_bounds_are_rejected() {
    assert!(DomainDescriptor::new(f64::NAN, 1.0, 1).validate("u").is_err());
    assert!(
        DomainDescriptor::new(0.0, f64::INFINITY, 1)
            .validate("v")
            .is_err()
    );
}

#[test]
fn open_grid_has_inclusive_samples_on_both_axes() {
    let spec = SurfaceSpec::parametric(
        DomainDescriptor::new(0.0, 1.0, 3),
        DomainDescriptor::new(0.0, 1.0, 5),
        "u * v",
        "",
    );
    let grid = spec.grid();
    assert_eq!(grid.point_grid(), [4, 6]);
    assert_eq!(grid.point_count(), 24);
    assert_eq!(grid.mesh_grid(), [3, 5, 2]);
    assert_eq!(grid.float_count(), 3 * 5 * 2 * 3 * 3);
}

#[test]
fn closed_axis_wraps_instead_of_adding_a_sample() {
    let spec = SurfaceSpec::cylindrical(
        DomainDescriptor::new(0.0, std::f64::consts::TAU, 8),
        DomainDescriptor::new(0.0, 1.0, 2),
        "1.0",
    );
    let grid = spec.grid();
    assert_eq!(grid.topology, Topology::Closed);
    assert_eq!(grid.point_grid(), [8, 3]);
    let sizes = grid.checked_byte_sizes().unwrap();
    assert_eq!(sizes.points, 8 * 3 * 12);
    assert_eq!(sizes.vertices, 8 * 2 * 2 * 3 * 12);
}

#[test]
fn oversized_grid_is_a_validation_error() {
    let spec = SurfaceSpec::parametric(
        DomainDescriptor::new(0.0, 1.0, u32::MAX - 1),
        DomainDescriptor::new(0.0, 1.0, u32::MAX - 1),
        "",
        "",
    );
    assert!(matches!(spec.validate(), Err(MeshError::Validation(_))));
}

#[test]
fn empty_expressions_fall_back_to_defaults() {
    let spec = SurfaceSpec::parametric(
        DomainDescriptor::new(0.0, 1.0, 1),
        DomainDescriptor::new(0.0, 1.0, 1),
        "   ",
        "",
    );
    assert_eq!(spec.field_expr(), "0.0");
    assert_eq!(spec.conversion_expr(), "vec3(u, v, r)");

    let cyl = SurfaceSpec::cylindrical(
        DomainDescriptor::new(0.0, 1.0, 1),
        DomainDescriptor::new(0.0, 1.0, 1),
        "",
    );
    assert_eq!(
        cyl.conversion_expr(),
        "vec3(cos(phi) * rho, sin(phi) * rho, z)"
    );
}

#[test]
fn params_block_is_little_endian_f32() {
    let spec = SurfaceSpec::parametric(
        DomainDescriptor::new(-1.0, 1.0, 4),
        DomainDescriptor::new(2.0, 4.0, 2),
        "",
        "",
    );
    let params = spec.params();
    let bytes = params.to_le_bytes();
    assert_eq!(&bytes[0..4], &(-1.0f32).to_le_bytes());
    assert_eq!(&bytes[4..8], &0.5f32.to_le_bytes());
    assert_eq!(&bytes[8..12], &2.0f32.to_le_bytes());
    assert_eq!(&bytes[12..16], &1.0f32.to_le_bytes());
    assert_eq!(ParamsBlock::from_le_bytes(&bytes), Some(params));
    assert_eq!(ParamsBlock::from_le_bytes(&bytes[..15]), None);
    assert_eq!(params.sample(2, 1), (0.0, 3.0));
}
