//! JSON request and response bodies.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainDescriptor, SurfaceSpec};
use crate::foundation::error::{MeshError, MeshResult};

/// `{"phi": .., "z": .., "expr": ".."}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CylindricalRequest {
    pub phi: DomainDescriptor,
    pub z: DomainDescriptor,
    /// Radius as a function of `phi` and `z`.
    #[serde(default)]
    pub expr: String,
}

/// `{"u": .., "v": .., "expr": "..", "conv": ".."}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParametricRequest {
    pub u: DomainDescriptor,
    pub v: DomainDescriptor,
    /// Field value `r` as a function of `u` and `v`.
    #[serde(default)]
    pub expr: String,
    /// Cartesian conversion over `r`, `u` and `v`; `vec3(u, v, r)` when empty.
    #[serde(default)]
    pub conv: String,
}

/// A surface request in either of its JSON shapes.
///
/// The shapes are told apart by their field names; unknown fields are rejected so a body can never
/// match both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SurfaceRequest {
    Cylindrical(CylindricalRequest),
    Parametric(ParametricRequest),
}

impl SurfaceRequest {
    /// Parse a request from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> MeshResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| MeshError::serde(format!("parse request JSON: {e}")))
    }

    /// Parse a request from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            MeshError::validation(format!("open request JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// The surface this request describes.
    pub fn into_spec(self) -> SurfaceSpec {
        match self {
            Self::Cylindrical(r) => SurfaceSpec::cylindrical(r.phi, r.z, r.expr),
            Self::Parametric(r) => SurfaceSpec::parametric(r.u, r.v, r.expr, r.conv),
        }
    }
}

impl From<SurfaceRequest> for SurfaceSpec {
    fn from(req: SurfaceRequest) -> Self {
        req.into_spec()
    }
}

/// Generated geometry: three vertices per triangle, one flat normal per vertex.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Packed `x, y, z` vertex positions.
    pub vertices: Vec<f32>,
    /// Packed `x, y, z` normals, parallel to `vertices`.
    pub normals: Vec<f32>,
}

impl Mesh {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 9
    }

    /// Write the response JSON.
    pub fn to_writer<W: std::io::Write>(&self, w: W) -> MeshResult<()> {
        serde_json::to_writer(w, self)
            .map_err(|e| MeshError::serde(format!("write mesh JSON: {e}")))
    }
}

#[cfg(test)]
#[path = "../tests/unit/request.rs"]
mod tests;
