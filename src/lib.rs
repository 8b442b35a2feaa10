//! Paramesh turns a scalar field over a 2-D parametric domain into a triangle mesh.
//!
//! A request names two sampling domains, a field expression and (for parametric surfaces) a
//! conversion to Cartesian space. The point program is synthesized per request and run together
//! with a fixed mesh program on a compute device:
//!
//! - Create a [`ComputeContext`] from [`ContextSettings`]
//! - Describe a surface with [`SurfaceSpec`] or parse a [`SurfaceRequest`]
//! - Call [`ComputeContext::generate`] to get a [`Mesh`]
#![forbid(unsafe_code)]

pub mod buffers;
pub mod build;
pub mod config;
pub mod context;
pub mod device;
pub mod domain;
pub mod expression;
pub mod foundation;
pub mod kernel;
pub mod mesh_index;
pub mod pipeline;
pub mod request;

pub use build::{BuildFailure, BuildReport, BuildStatus};
pub use config::{ContextSettings, HostDeviceOpts};
pub use context::ComputeContext;
pub use device::{BackendKind, ComputeDevice, DeviceError, DeviceIdentity};
pub use domain::{DomainDescriptor, SurfaceKind, SurfaceSpec, Topology};
pub use foundation::error::{MeshError, MeshResult};
pub use pipeline::{CancelToken, Stage};
pub use request::{Mesh, SurfaceRequest};
