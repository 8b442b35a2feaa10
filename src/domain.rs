//! Sampling domains, surface variants and the sizes derived from them.

use serde::{Deserialize, Serialize};

use crate::foundation::error::{MeshError, MeshResult};

/// Size of one packed float component on the device.
pub const FLOAT_SIZE: u64 = 4;

/// Floats per packed point, vertex or normal record.
pub const COMPONENTS: u64 = 3;

/// Sampling interval of one parametric axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainDescriptor {
    /// Lower bound of the axis.
    pub min: f64,
    /// Upper bound of the axis.
    pub max: f64,
    /// Number of intervals; must be at least 1.
    pub res: u32,
}

impl DomainDescriptor {
    /// Construct a descriptor without validating it.
    pub fn new(min: f64, max: f64, res: u32) -> Self {
        Self { min, max, res }
    }

    /// Distance between two consecutive samples.
    pub fn step(&self) -> f64 {
        (self.max - self.min) / f64::from(self.res)
    }

    /// Check `res >= 1` and finite bounds.
    pub fn validate(&self, axis: &str) -> MeshResult<()> {
        if self.res == 0 {
            return Err(MeshError::validation(format!(
                "domain '{axis}' res must be >= 1"
            )));
        }
        if self.res == u32::MAX {
            return Err(MeshError::validation(format!(
                "domain '{axis}' res must be < {}",
                u32::MAX
            )));
        }
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(MeshError::validation(format!(
                "domain '{axis}' bounds must be finite (min={}, max={})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// How an axis treats its upper bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Samples span `[min, max]` inclusively: `res + 1` samples.
    Open,
    /// Periodic axis: the sample at `max` is the sample at `min`, `res` samples.
    Closed,
}

impl Topology {
    /// Extra samples beyond `res` along an axis with this topology.
    pub fn extra_samples(self) -> u32 {
        match self {
            Self::Open => 1,
            Self::Closed => 0,
        }
    }
}

/// Which of the two surface families a request describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// `rho = f(phi, z)`, converted with cylindrical coordinates; `phi` wraps.
    Cylindrical,
    /// `r = f(u, v)`, converted with a caller-supplied expression; both axes open.
    Parametric,
}

impl SurfaceKind {
    /// Variable names bound to axis 0 and axis 1 inside expressions.
    pub fn axis_names(self) -> [&'static str; 2] {
        match self {
            Self::Cylindrical => ["phi", "z"],
            Self::Parametric => ["u", "v"],
        }
    }

    /// Variable name bound to the field value inside the conversion.
    pub fn value_name(self) -> &'static str {
        match self {
            Self::Cylindrical => "rho",
            Self::Parametric => "r",
        }
    }

    /// Topology of axis 0. Axis 1 is always open.
    pub fn topology(self) -> Topology {
        match self {
            Self::Cylindrical => Topology::Closed,
            Self::Parametric => Topology::Open,
        }
    }

    /// Conversion used when the request does not supply one.
    pub fn default_conversion(self) -> &'static str {
        match self {
            Self::Cylindrical => "vec3(cos(phi) * rho, sin(phi) * rho, z)",
            Self::Parametric => "vec3(u, v, r)",
        }
    }
}

/// Everything the pipeline needs to know about one surface request.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceSpec {
    /// Surface family.
    pub kind: SurfaceKind,
    /// Sampling of axis 0 and axis 1.
    pub domains: [DomainDescriptor; 2],
    /// Field expression text, injected verbatim.
    pub expr: String,
    /// Conversion expression text; empty selects the kind's default.
    pub conversion: String,
}

impl SurfaceSpec {
    /// Cylindrical surface `rho = expr(phi, z)`.
    pub fn cylindrical(phi: DomainDescriptor, z: DomainDescriptor, expr: impl Into<String>) -> Self {
        Self {
            kind: SurfaceKind::Cylindrical,
            domains: [phi, z],
            expr: expr.into(),
            conversion: String::new(),
        }
    }

    /// Parametric surface `r = expr(u, v)` mapped through `conversion`.
    pub fn parametric(
        u: DomainDescriptor,
        v: DomainDescriptor,
        expr: impl Into<String>,
        conversion: impl Into<String>,
    ) -> Self {
        Self {
            kind: SurfaceKind::Parametric,
            domains: [u, v],
            expr: expr.into(),
            conversion: conversion.into(),
        }
    }

    /// Validate both domains and the derived buffer sizes.
    pub fn validate(&self) -> MeshResult<()> {
        let [a0, a1] = self.kind.axis_names();
        self.domains[0].validate(a0)?;
        self.domains[1].validate(a1)?;
        self.grid().checked_byte_sizes().ok_or_else(|| {
            MeshError::validation(format!(
                "grid {}x{} is too large to allocate",
                self.domains[0].res, self.domains[1].res
            ))
        })?;
        Ok(())
    }

    /// Field expression, with an empty text standing for the constant 0.
    pub fn field_expr(&self) -> &str {
        let trimmed = self.expr.trim();
        if trimmed.is_empty() { "0.0" } else { trimmed }
    }

    /// Conversion expression, falling back to the kind's default.
    pub fn conversion_expr(&self) -> &str {
        let trimmed = self.conversion.trim();
        if trimmed.is_empty() || self.kind == SurfaceKind::Cylindrical {
            self.kind.default_conversion()
        } else {
            trimmed
        }
    }

    /// Sample grid derived from the domains.
    pub fn grid(&self) -> GridShape {
        GridShape {
            topology: self.kind.topology(),
            res: [self.domains[0].res, self.domains[1].res],
        }
    }

    /// Params block written to the device once per request.
    pub fn params(&self) -> ParamsBlock {
        ParamsBlock {
            axis0_min: self.domains[0].min as f32,
            axis0_step: self.domains[0].step() as f32,
            axis1_min: self.domains[1].min as f32,
            axis1_step: self.domains[1].step() as f32,
        }
    }
}

/// Sizes of every grid and buffer involved in one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    /// Topology of axis 0.
    pub topology: Topology,
    /// Interval counts of axis 0 and axis 1.
    pub res: [u32; 2],
}

/// Byte sizes of the device buffers of one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferSizes {
    /// Point buffer size.
    pub points: u64,
    /// Vertex buffer size; the normal buffer has the same size.
    pub vertices: u64,
}

impl GridShape {
    /// Point grid launched for `computePoints`: `[axis0 samples, axis1 samples]`.
    pub fn point_grid(&self) -> [u32; 2] {
        [
            self.res[0] + self.topology.extra_samples(),
            self.res[1] + 1,
        ]
    }

    /// Mesh grid launched for `computeMesh`: one invocation per quad and triangle.
    pub fn mesh_grid(&self) -> [u32; 3] {
        [self.res[0], self.res[1], 2]
    }

    /// Number of points in the point buffer.
    pub fn point_count(&self) -> u64 {
        let [x, y] = self.point_grid();
        u64::from(x) * u64::from(y)
    }

    /// Number of triangles, two per quad.
    pub fn triangle_count(&self) -> u64 {
        u64::from(self.res[0]) * u64::from(self.res[1]) * 2
    }

    /// Number of emitted vertices, three per triangle.
    pub fn vertex_count(&self) -> u64 {
        self.triangle_count() * 3
    }

    /// Length of the flattened vertex (and normal) arrays.
    pub fn float_count(&self) -> u64 {
        self.vertex_count() * COMPONENTS
    }

    /// Byte sizes of the point and vertex buffers, `None` on overflow.
    pub fn checked_byte_sizes(&self) -> Option<BufferSizes> {
        let points = self
            .point_count()
            .checked_mul(COMPONENTS * FLOAT_SIZE)?;
        let vertices = u64::from(self.res[0])
            .checked_mul(u64::from(self.res[1]))?
            .checked_mul(2 * 3 * COMPONENTS * FLOAT_SIZE)?;
        Some(BufferSizes { points, vertices })
    }
}

/// Fixed 4 x f32 record describing where samples start and how far apart they are.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamsBlock {
    /// First sample of axis 0.
    pub axis0_min: f32,
    /// Sample spacing of axis 0.
    pub axis0_step: f32,
    /// First sample of axis 1.
    pub axis1_min: f32,
    /// Sample spacing of axis 1.
    pub axis1_step: f32,
}

impl ParamsBlock {
    /// Encoded size in bytes.
    pub const SIZE: usize = 16;

    /// Little-endian encoding matching the device-side `Params` struct.
    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let fields = [
            self.axis0_min,
            self.axis0_step,
            self.axis1_min,
            self.axis1_step,
        ];
        for (chunk, value) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Decode the first 16 bytes of `bytes`.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..Self::SIZE)?;
        let mut fields = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));
        Some(Self {
            axis0_min: fields.next()?,
            axis0_step: fields.next()?,
            axis1_min: fields.next()?,
            axis1_step: fields.next()?,
        })
    }

    /// Sample coordinates of grid point `(i, j)`, computed the way the kernels do.
    pub fn sample(&self, i: u32, j: u32) -> (f32, f32) {
        (
            self.axis0_min + i as f32 * self.axis0_step,
            self.axis1_min + j as f32 * self.axis1_step,
        )
    }
}

#[cfg(test)]
#[path = "../tests/unit/domain.rs"]
mod tests;
