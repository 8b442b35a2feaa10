//! Kernel program synthesis.

pub mod source;

pub use source::{
    KernelArg, KernelEntry, MESH_ENTRY, POINTS_ENTRY, PointsManifest, ProgramManifest, ProgramSource,
    mesh_source, point_source,
};
