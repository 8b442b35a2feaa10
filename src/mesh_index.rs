//! Index arithmetic turning a regular sample grid into a flat triangle list.
//!
//! These functions are device independent. The host device's mesh kernel calls them directly and
//! the synthesized WGSL mirrors them line for line.

use crate::domain::Topology;

/// Linear index of grid point `(i, j)` in a point buffer with row length `stride`.
///
/// On a closed axis `i` wraps, so `i == stride` addresses the first column again.
pub fn point_index(i: u32, j: u32, stride: u32, topology: Topology) -> u32 {
    match topology {
        Topology::Open => i + j * stride,
        Topology::Closed => (i % stride) + j * stride,
    }
}

/// Linear index of grid quad `(i, j)`.
pub fn quad_index(i: u32, j: u32, stride_quads: u32) -> u32 {
    i + j * stride_quads
}

/// Linear index of triangle `t` (0 or 1) of quad `(i, j)`.
pub fn triangle_index(i: u32, j: u32, t: u32, stride_quads: u32) -> u32 {
    quad_index(i, j, stride_quads) * 2 + t
}

/// Inverse of [`triangle_index`]: `(i, j, t)` for a triangle index.
pub fn triangle_coords(ti: u32, stride_quads: u32) -> (u32, u32, u32) {
    let quad = ti / 2;
    (quad % stride_quads, quad / stride_quads, ti % 2)
}

/// Grid corners of triangle `t` of quad `(i, j)`, using the fixed `(i,j)-(i+1,j+1)` diagonal.
pub fn triangle_corners(i: u32, j: u32, t: u32) -> [(u32, u32); 3] {
    if t == 0 {
        [(i, j), (i + 1, j), (i + 1, j + 1)]
    } else {
        [(i, j), (i + 1, j + 1), (i, j + 1)]
    }
}

/// Flat face normal `normalize((v1 - v0) x (v2 - v0))`.
///
/// Degenerate triangles produce NaN components, like `normalize` on the device.
pub fn face_normal(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> [f32; 3] {
    let a = sub(v1, v0);
    let b = sub(v2, v0);
    let n = [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    [n[0] / len, n[1] / len, n[2] / len]
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[cfg(test)]
#[path = "../tests/unit/mesh_index.rs"]
mod tests;
