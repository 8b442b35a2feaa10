use std::fmt;
use std::sync::Arc;

use crate::build::{Program, build_program};
use crate::config::ContextSettings;
use crate::device::{ComputeDevice, enumerate_devices};
use crate::domain::{SurfaceSpec, Topology};
use crate::expression::check_surface_expressions;
use crate::foundation::error::{MeshError, MeshResult};
use crate::kernel::source::mesh_source;
use crate::pipeline::{self, CancelToken, Stage, Target};
use crate::request::{Mesh, SurfaceRequest};

/// Owned handle to the compute devices and the programs cached on them.
///
/// The fixed mesh programs are built on every device when the context is constructed; the point
/// program is built per request. Requests execute on the primary device and may be issued from
/// several threads at once.
pub struct ComputeContext {
    devices: Vec<Arc<dyn ComputeDevice>>,
    primary: usize,
    open_mesh: Program,
    closed_mesh: Program,
    settings: ContextSettings,
}

impl ComputeContext {
    /// Enumerate the configured backend and build the fixed programs.
    pub fn new(settings: ContextSettings) -> MeshResult<Self> {
        let devices = enumerate_devices(settings.backend, &settings.host)?;
        Self::with_devices(devices, settings)
    }

    /// Use `devices` instead of enumerating a backend.
    pub fn with_devices(
        devices: Vec<Arc<dyn ComputeDevice>>,
        settings: ContextSettings,
    ) -> MeshResult<Self> {
        if devices.is_empty() {
            return Err(MeshError::validation("no compute devices"));
        }
        if settings.device >= devices.len() {
            return Err(MeshError::validation(format!(
                "device index {} out of range ({} device(s))",
                settings.device,
                devices.len()
            )));
        }
        for (n, device) in devices.iter().enumerate() {
            tracing::info!("device {n}: {}", device.identity());
        }

        let open_mesh = build_program(&devices, &mesh_source(Topology::Open))?;
        let closed_mesh = build_program(&devices, &mesh_source(Topology::Closed))?;
        tracing::info!(
            "executing on device {}: {}",
            settings.device,
            devices[settings.device].identity()
        );

        Ok(Self {
            primary: settings.device,
            devices,
            open_mesh,
            closed_mesh,
            settings,
        })
    }

    /// Every device programs are built on.
    pub fn devices(&self) -> &[Arc<dyn ComputeDevice>] {
        &self.devices
    }

    /// The device requests execute on.
    pub fn primary(&self) -> &Arc<dyn ComputeDevice> {
        &self.devices[self.primary]
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Generate the mesh of `spec`.
    pub fn generate(&self, spec: &SurfaceSpec) -> MeshResult<Mesh> {
        self.generate_with(spec, &CancelToken::new())
    }

    /// Generate the mesh of `spec`, giving up before the next stage once `cancel` fires.
    pub fn generate_with(&self, spec: &SurfaceSpec, cancel: &CancelToken) -> MeshResult<Mesh> {
        self.generate_observed(spec, cancel, &mut |_| {})
    }

    /// Like [`ComputeContext::generate_with`], reporting every stage transition to `observer`.
    pub fn generate_observed(
        &self,
        spec: &SurfaceSpec,
        cancel: &CancelToken,
        observer: &mut dyn FnMut(Stage),
    ) -> MeshResult<Mesh> {
        spec.validate()?;
        if self.settings.validate_expressions {
            let [a0, a1] = spec.kind.axis_names();
            check_surface_expressions(
                spec.field_expr(),
                &[a0, a1],
                spec.conversion_expr(),
                &[spec.kind.value_name(), a0, a1],
            )
            .map_err(MeshError::expression)?;
        }

        let mesh = match spec.kind.topology() {
            Topology::Open => &self.open_mesh,
            Topology::Closed => &self.closed_mesh,
        };
        let target = Target {
            devices: &self.devices,
            primary: self.primary(),
            mesh,
        };
        pipeline::run(&target, spec, cancel, observer)
    }

    /// Generate the mesh of a parsed JSON request.
    pub fn generate_request(&self, request: SurfaceRequest) -> MeshResult<Mesh> {
        self.generate(&request.into_spec())
    }
}

impl fmt::Debug for ComputeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeContext")
            .field(
                "devices",
                &self
                    .devices
                    .iter()
                    .map(|d| d.identity().name.clone())
                    .collect::<Vec<_>>(),
            )
            .field("primary", &self.primary)
            .field("settings", &self.settings)
            .finish()
    }
}
