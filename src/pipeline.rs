//! The per-request dispatch pipeline.
//!
//! ```text
//! Idle -> ProgramsBuilding -> ProgramsReady -> ParamsWriting -> PointsComputing
//!      -> MeshComputing -> VerticesReading -> NormalsReading -> Done
//! ```
//!
//! A build failure ends in `BuildFailed`; any other error or a cancellation ends in `Failed`.
//! Every buffer, kernel and program created along the way is released on all exit paths.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::buffers::{DeviceBuffer, decode_f32_le};
use crate::build::{Kernel, Program, build_program};
use crate::device::{BufferAccess, ComputeDevice};
use crate::domain::{ParamsBlock, SurfaceSpec};
use crate::foundation::error::{MeshError, MeshResult};
use crate::kernel::source::{MESH_ENTRY, POINTS_ENTRY, point_source};
use crate::request::Mesh;

/// Pipeline state of one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    ProgramsBuilding,
    ProgramsReady,
    BuildFailed,
    ParamsWriting,
    PointsComputing,
    MeshComputing,
    VerticesReading,
    NormalsReading,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::ProgramsBuilding => "programs building",
            Self::ProgramsReady => "programs ready",
            Self::BuildFailed => "build failed",
            Self::ParamsWriting => "params writing",
            Self::PointsComputing => "points computing",
            Self::MeshComputing => "mesh computing",
            Self::VerticesReading => "vertices reading",
            Self::NormalsReading => "normals reading",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Cooperative cancellation flag, checked before every stage.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Stages already running finish first.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Tracker<'a> {
    stage: Stage,
    cancel: &'a CancelToken,
    observer: &'a mut dyn FnMut(Stage),
}

impl Tracker<'_> {
    fn set(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "stage");
        self.stage = stage;
        (self.observer)(stage);
    }

    fn enter(&mut self, stage: Stage) -> MeshResult<()> {
        if self.cancel.is_cancelled() {
            return Err(MeshError::Cancelled { stage });
        }
        self.set(stage);
        Ok(())
    }
}

/// Devices and cached programs a request runs against.
pub(crate) struct Target<'a> {
    /// Every device the point program is built on.
    pub devices: &'a [Arc<dyn ComputeDevice>],
    /// The device the request executes on.
    pub primary: &'a Arc<dyn ComputeDevice>,
    /// Fixed mesh program matching the request's topology.
    pub mesh: &'a Program,
}

/// Run one request to completion, reporting every stage transition to `observer`.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(
        kind = ?spec.kind,
        res0 = spec.domains[0].res,
        res1 = spec.domains[1].res,
        device = %target.primary.identity().name,
    )
)]
pub(crate) fn run(
    target: &Target<'_>,
    spec: &SurfaceSpec,
    cancel: &CancelToken,
    observer: &mut dyn FnMut(Stage),
) -> MeshResult<Mesh> {
    let mut tracker = Tracker {
        stage: Stage::Idle,
        cancel,
        observer,
    };
    let result = run_stages(target, spec, &mut tracker);
    match &result {
        Ok(_) => tracker.set(Stage::Done),
        Err(MeshError::Build(_)) => {}
        Err(e) => {
            tracing::debug!(stage = %tracker.stage, "request failed: {e}");
            tracker.set(Stage::Failed);
        }
    }
    result
}

fn run_stages(target: &Target<'_>, spec: &SurfaceSpec, tracker: &mut Tracker<'_>) -> MeshResult<Mesh> {
    let primary = target.primary;
    let grid = spec.grid();
    let sizes = grid.checked_byte_sizes().ok_or_else(|| {
        MeshError::validation(format!(
            "grid {}x{} is too large to allocate",
            grid.res[0], grid.res[1]
        ))
    })?;

    tracker.enter(Stage::ProgramsBuilding)?;
    let points_program = match build_program(target.devices, &point_source(spec)) {
        Ok(program) => {
            tracker.set(Stage::ProgramsReady);
            program
        }
        Err(failure) => {
            tracker.set(Stage::BuildFailed);
            return Err(failure.into());
        }
    };
    let points_id = program_on(&points_program, primary)?;
    let mesh_id = program_on(target.mesh, primary)?;

    let params = DeviceBuffer::allocate(
        primary,
        ParamsBlock::SIZE as u64,
        BufferAccess::ReadOnly,
        "params",
    )?;
    let points = DeviceBuffer::allocate(primary, sizes.points, BufferAccess::ReadWrite, "points")?;
    let vertices =
        DeviceBuffer::allocate(primary, sizes.vertices, BufferAccess::WriteOnly, "vertices")?;
    let normals =
        DeviceBuffer::allocate(primary, sizes.vertices, BufferAccess::WriteOnly, "normals")?;

    tracker.enter(Stage::ParamsWriting)?;
    params.write(spec.params().to_le_bytes().to_vec()).wait()?;

    tracker.enter(Stage::PointsComputing)?;
    let kernel = Kernel::create(primary, points_id, POINTS_ENTRY, &[points.id(), params.id()])?;
    let [px, py] = grid.point_grid();
    kernel.launch([px, py, 1]).wait()?;
    kernel.release()?;
    params.release()?;

    tracker.enter(Stage::MeshComputing)?;
    let kernel = Kernel::create(
        primary,
        mesh_id,
        MESH_ENTRY,
        &[points.id(), vertices.id(), normals.id()],
    )?;
    kernel.launch(grid.mesh_grid()).wait()?;
    kernel.release()?;
    points.release()?;
    drop(points_program);

    tracker.enter(Stage::VerticesReading)?;
    let vertex_bytes = vertices.read().wait()?;
    vertices.release()?;

    tracker.enter(Stage::NormalsReading)?;
    let normal_bytes = normals.read().wait()?;
    normals.release()?;

    Ok(Mesh {
        vertices: decode_f32_le(&vertex_bytes),
        normals: decode_f32_le(&normal_bytes),
    })
}

fn program_on(
    program: &Program,
    device: &Arc<dyn ComputeDevice>,
) -> MeshResult<crate::device::ProgramId> {
    program.id_on(device).ok_or_else(|| {
        MeshError::Other(anyhow::anyhow!(
            "program '{}' was not built on {}",
            program.label(),
            device.identity()
        ))
    })
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;
