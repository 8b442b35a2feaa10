//! WGSL and manifest synthesis for the point and mesh programs.
//!
//! Every program is emitted twice from the same inputs: WGSL text for wgpu devices and a
//! [`ProgramManifest`] that the host device compiles with the restricted expression grammar.

use crate::domain::{SurfaceKind, SurfaceSpec, Topology};

/// Entry point of the per-request point program.
pub const POINTS_ENTRY: &str = "computePoints";

/// Entry point of the fixed mesh program.
pub const MESH_ENTRY: &str = "computeMesh";

const WORKGROUP_SIZE: [u32; 3] = [8, 8, 1];

/// One `@group(0)` binding of an entry point; the binding number is its position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelArg {
    /// Variable name in the source.
    pub name: &'static str,
    /// The kernel reads the buffer.
    pub reads: bool,
    /// The kernel writes the buffer.
    pub writes: bool,
}

const POINTS_ARGS: &[KernelArg] = &[
    KernelArg {
        name: "points",
        reads: false,
        writes: true,
    },
    KernelArg {
        name: "params",
        reads: true,
        writes: false,
    },
];

const MESH_ARGS: &[KernelArg] = &[
    KernelArg {
        name: "points",
        reads: true,
        writes: false,
    },
    KernelArg {
        name: "vertices",
        reads: false,
        writes: true,
    },
    KernelArg {
        name: "normals",
        reads: false,
        writes: true,
    },
];

/// One compute entry point of a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelEntry {
    /// Function name in the source.
    pub name: &'static str,
    /// `@workgroup_size` of the entry.
    pub workgroup_size: [u32; 3],
    /// Arguments in binding order.
    pub args: &'static [KernelArg],
}

/// Structured description of the point kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointsManifest {
    /// Topology of axis 0.
    pub topology: Topology,
    /// Variable names of axis 0 and axis 1.
    pub axes: [&'static str; 2],
    /// Variable name of the field value inside the conversion.
    pub value: &'static str,
    /// Field expression text.
    pub field: String,
    /// Conversion expression text.
    pub conversion: String,
}

impl PointsManifest {
    /// Variables visible to the conversion, in argument order.
    pub fn conversion_vars(&self) -> [&'static str; 3] {
        [self.value, self.axes[0], self.axes[1]]
    }
}

/// What a program computes, independent of its WGSL text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramManifest {
    /// Dynamic `computePoints` program.
    Points(PointsManifest),
    /// Fixed `computeMesh` program.
    Mesh {
        /// Topology of axis 0.
        topology: Topology,
    },
}

/// A synthesized program ready to hand to every device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramSource {
    /// Short label used in logs and build reports.
    pub label: String,
    /// WGSL compute source.
    pub wgsl: String,
    /// Entry points defined by `wgsl`.
    pub entries: Vec<KernelEntry>,
    /// Structured form of the same program.
    pub manifest: ProgramManifest,
}

impl ProgramSource {
    /// Entry point named `name`, if the program defines it.
    pub fn entry(&self, name: &str) -> Option<&KernelEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Synthesize the point program of `spec`. Expressions are injected literally.
pub fn point_source(spec: &SurfaceSpec) -> ProgramSource {
    let manifest = PointsManifest {
        topology: spec.kind.topology(),
        axes: spec.kind.axis_names(),
        value: spec.kind.value_name(),
        field: spec.field_expr().to_owned(),
        conversion: spec.conversion_expr().to_owned(),
    };
    let [a0, a1] = manifest.axes;
    let value = manifest.value;

    let mut w = String::new();
    w.push_str(&format!("// {} surface points\n", kind_name(spec.kind)));
    w.push_str(&prelude(manifest.topology));
    w.push_str(
        "struct Params {
    axis0_min: f32,
    axis0_step: f32,
    axis1_min: f32,
    axis1_step: f32,
}

@group(0) @binding(0) var<storage, read_write> points: array<f32>;
@group(0) @binding(1) var<uniform> params: Params;

",
    );
    w.push_str(&format!("fn field({a0}: f32, {a1}: f32) -> f32 {{\n"));
    w.push_str(&format!("    return {};\n", manifest.field));
    w.push_str("}\n\n");
    w.push_str(&format!(
        "fn to_cartesian({value}: f32, {a0}: f32, {a1}: f32) -> vec3<f32> {{\n"
    ));
    w.push_str(&format!("    return {};\n", manifest.conversion));
    w.push_str("}\n\n");
    w.push_str(&entry_header(POINTS_ENTRY));
    w.push_str(
        "    if (id.x >= launch.size.x || id.y >= launch.size.y) {
        return;
    }
    let stride = launch.size.x;
    let a0 = params.axis0_min + f32(id.x) * params.axis0_step;
    let a1 = params.axis1_min + f32(id.y) * params.axis1_step;
    let p = to_cartesian(field(a0, a1), a0, a1);
    let base = point_index(id.x, id.y, stride) * 3u;
    points[base] = p.x;
    points[base + 1u] = p.y;
    points[base + 2u] = p.z;
}
",
    );

    ProgramSource {
        label: format!("points:{}", kind_name(spec.kind)),
        wgsl: w,
        entries: vec![KernelEntry {
            name: POINTS_ENTRY,
            workgroup_size: WORKGROUP_SIZE,
            args: POINTS_ARGS,
        }],
        manifest: ProgramManifest::Points(manifest),
    }
}

/// Synthesize the fixed mesh program for `topology`. The text never depends on a request.
pub fn mesh_source(topology: Topology) -> ProgramSource {
    let mut w = String::new();
    w.push_str(&format!("// {} mesh\n", topology_name(topology)));
    w.push_str(&prelude(topology));
    w.push_str(
        "@group(0) @binding(0) var<storage, read> points: array<f32>;
@group(0) @binding(1) var<storage, read_write> vertices: array<f32>;
@group(0) @binding(2) var<storage, read_write> normals: array<f32>;

fn quad_index(u: u32, v: u32, stride_quads: u32) -> u32 {
    return u + v * stride_quads;
}

fn triangle_index(u: u32, v: u32, t: u32, stride_quads: u32) -> u32 {
    return quad_index(u, v, stride_quads) * 2u + t;
}

fn load_point(u: u32, v: u32, stride: u32) -> vec3<f32> {
    let base = point_index(u, v, stride) * 3u;
    return vec3<f32>(points[base], points[base + 1u], points[base + 2u]);
}

fn store_vertex(index: u32, p: vec3<f32>) {
    vertices[index * 3u] = p.x;
    vertices[index * 3u + 1u] = p.y;
    vertices[index * 3u + 2u] = p.z;
}

fn store_normal(index: u32, n: vec3<f32>) {
    normals[index * 3u] = n.x;
    normals[index * 3u + 1u] = n.y;
    normals[index * 3u + 2u] = n.z;
}

",
    );
    w.push_str(&entry_header(MESH_ENTRY));
    w.push_str(
        "    if (id.x >= launch.size.x || id.y >= launch.size.y || id.z >= launch.size.z) {
        return;
    }
    let quads = launch.size.x;
",
    );
    match topology {
        Topology::Open => w.push_str("    let stride = quads + 1u;\n"),
        Topology::Closed => w.push_str("    let stride = quads;\n"),
    }
    w.push_str(
        "    let v0 = load_point(id.x, id.y, stride);
    var v1 = load_point(id.x + 1u, id.y, stride);
    var v2 = load_point(id.x + 1u, id.y + 1u, stride);
    if (id.z == 1u) {
        v1 = v2;
        v2 = load_point(id.x, id.y + 1u, stride);
    }
    let n = normalize(cross(v1 - v0, v2 - v0));
    let first = triangle_index(id.x, id.y, id.z, quads) * 3u;
    store_vertex(first, v0);
    store_vertex(first + 1u, v1);
    store_vertex(first + 2u, v2);
    store_normal(first, n);
    store_normal(first + 1u, n);
    store_normal(first + 2u, n);
}
",
    );

    ProgramSource {
        label: format!("mesh:{}", topology_name(topology)),
        wgsl: w,
        entries: vec![KernelEntry {
            name: MESH_ENTRY,
            workgroup_size: WORKGROUP_SIZE,
            args: MESH_ARGS,
        }],
        manifest: ProgramManifest::Mesh { topology },
    }
}

fn prelude(topology: Topology) -> String {
    let index = match topology {
        Topology::Open => "u + v * stride",
        Topology::Closed => "(u % stride) + v * stride",
    };
    format!(
        "const pi: f32 = 3.141592653589793;

struct LaunchExtent {{
    size: vec3<u32>,
}}

@group(1) @binding(0) var<uniform> launch: LaunchExtent;

fn point_index(u: u32, v: u32, stride: u32) -> u32 {{
    return {index};
}}

"
    )
}

fn entry_header(name: &str) -> String {
    let [x, y, z] = WORKGROUP_SIZE;
    format!(
        "@compute @workgroup_size({x}, {y}, {z})\nfn {name}(@builtin(global_invocation_id) id: vec3<u32>) {{\n"
    )
}

fn kind_name(kind: SurfaceKind) -> &'static str {
    match kind {
        SurfaceKind::Cylindrical => "cylindrical",
        SurfaceKind::Parametric => "parametric",
    }
}

fn topology_name(topology: Topology) -> &'static str {
    match topology {
        Topology::Open => "open",
        Topology::Closed => "closed",
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/source.rs"]
mod tests;
