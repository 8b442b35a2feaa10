use super::*;
use std::collections::BTreeSet;

#[test]
fn open_point_index_is_row_major() {
    assert_eq!(point_index(0, 0, 5, Topology::Open), 0);
    assert_eq!(point_index(4, 0, 5, Topology::Open), 4);
    assert_eq!(point_index(0, 1, 5, Topology::Open), 5);
    assert_eq!(point_index(3, 2, 5, Topology::Open), 13);
}

#[test]
fn closed_point_index_is_periodic() {
    for stride in 1..6 {
        for i in 0..12 {
            for j in 0..4 {
                assert_eq!(
                    point_index(i, j, stride, Topology::Closed),
                    point_index(i + stride, j, stride, Topology::Closed)
                );
            }
        }
    }
    assert_eq!(point_index(4, 1, 4, Topology::Closed), 4);
}

#[test]
fn triangle_index_is_a_bijection() {
    for (res0, res1) in [(1, 1), (3, 2), (4, 4), (7, 3)] {
        let mut seen = BTreeSet::new();
        for j in 0..res1 {
            for i in 0..res0 {
                for t in 0..2 {
                    let ti = triangle_index(i, j, t, res0);
                    assert!(ti < res0 * res1 * 2);
                    assert!(seen.insert(ti), "duplicate triangle index {ti}");
                    assert_eq!(triangle_coords(ti, res0), (i, j, t));
                }
            }
        }
        assert_eq!(seen.len() as u32, res0 * res1 * 2);
    }
}

#[test]
fn corners_split_along_the_main_diagonal() {
    assert_eq!(triangle_corners(2, 3, 0), [(2, 3), (3, 3), (3, 4)]);
    assert_eq!(triangle_corners(2, 3, 1), [(2, 3), (3, 4), (2, 4)]);
}

#[test]
fn face_normal_is_unit_and_right_handed() {
    let n = face_normal([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0]);
    assert_eq!(n, [0.0, 0.0, 1.0]);

    let n = face_normal([1.0, 2.0, 3.0], [4.0, -1.0, 0.5], [0.0, 5.0, 2.0]);
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    assert!((len - 1.0).abs() < 1e-6);
}

#[test]
fn degenerate_face_normal_is_nan() {
    let n = face_normal([1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]);
    assert!(n.iter().all(|c| c.is_nan()));
}
