//! The compute device seam.
//!
//! A [`ComputeDevice`] is one execution device with a single in-order queue. Operations that touch
//! device memory are enqueued and return a [`Completion`]; they run in submission order and the
//! caller waits on the completion before depending on the result.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};

use serde::{Deserialize, Serialize};

use crate::build::BuildStatus;
use crate::config::HostDeviceOpts;
use crate::kernel::source::{KernelEntry, ProgramSource};

#[cfg(feature = "gpu")]
pub mod gpu;
pub mod host;

/// Human readable identity of a device, used in build reports and logs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceIdentity {
    /// Device name, e.g. `host-cpu:0` or the adapter name.
    pub name: String,
    /// Backend family, e.g. `host` or `Vulkan`.
    pub backend: String,
}

impl DeviceIdentity {
    /// Construct an identity.
    pub fn new(name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.backend)
    }
}

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// Device memory region.
    BufferId,
    "buffer"
);
handle!(
    /// Compiled program.
    ProgramId,
    "program"
);
handle!(
    /// Kernel entry point with its arguments bound.
    KernelId,
    "kernel"
);

/// How kernels may access a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferAccess {
    /// Written by the host, read by kernels.
    ReadOnly,
    /// Written by kernels, read back by the host.
    WriteOnly,
    /// Device-internal scratch, read and written by kernels.
    ReadWrite,
}

impl BufferAccess {
    /// Whether kernels may read the buffer.
    pub fn kernel_readable(self) -> bool {
        !matches!(self, Self::WriteOnly)
    }

    /// Whether kernels may write the buffer.
    pub fn kernel_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Errors reported by a device for a single operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The backend or device cannot be used.
    #[error("{0}")]
    Unavailable(String),

    /// A handle does not name a live object on this device.
    #[error("unknown {kind} handle {id}")]
    UnknownHandle {
        /// Object kind (`buffer`, `program`, `kernel`).
        kind: &'static str,
        /// Raw handle value.
        id: u64,
    },

    /// A buffer was released while an enqueued operation still used it.
    #[error("{0} released with an outstanding operation")]
    Busy(BufferId),

    /// A size or launch extent does not fit.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A kernel argument violates the buffer's access mode.
    #[error("access violation: {0}")]
    Access(String),

    /// The device rejected an operation.
    #[error("{op} rejected: {message}")]
    Rejected {
        /// Operation name.
        op: &'static str,
        /// Device message.
        message: String,
    },

    /// The device queue shut down before the operation completed.
    #[error("device queue closed")]
    QueueClosed,
}

impl DeviceError {
    pub(crate) fn rejected(op: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            op,
            message: message.into(),
        }
    }
}

type Resolver<T> = Box<dyn FnOnce() -> Result<T, DeviceError> + Send>;

/// Completion signal of an enqueued operation.
///
/// The operation is already submitted when the completion is handed out; [`Completion::wait`]
/// blocks until the device reports the outcome.
#[must_use = "an enqueued operation must be awaited before its memory is reused or released"]
pub struct Completion<T> {
    resolve: Resolver<T>,
}

impl<T: Send + 'static> Completion<T> {
    /// Completion resolved by running `f`, typically driving the device until done.
    pub fn from_fn(f: impl FnOnce() -> Result<T, DeviceError> + Send + 'static) -> Self {
        Self {
            resolve: Box::new(f),
        }
    }

    /// Completion resolved when the device sends the outcome on `rx`.
    pub fn from_channel(rx: mpsc::Receiver<Result<T, DeviceError>>) -> Self {
        Self::from_fn(move || rx.recv().map_err(|_| DeviceError::QueueClosed)?)
    }

    /// Completion that is already resolved, e.g. an operation rejected at enqueue time.
    pub fn ready(outcome: Result<T, DeviceError>) -> Self {
        Self::from_fn(move || outcome)
    }

    /// Block until the operation completes.
    pub fn wait(self) -> Result<T, DeviceError> {
        (self.resolve)()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Outstanding-operation marker on a buffer; cleared when the operation finishes or is dropped
/// unrun.
pub(crate) struct PendingOp(Arc<AtomicUsize>);

impl PendingOp {
    pub(crate) fn begin(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for PendingOp {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Outcome of compiling one [`ProgramSource`] on one device.
#[derive(Debug)]
pub struct ProgramBuild {
    /// Success or failure.
    pub status: BuildStatus,
    /// Compiler diagnostics, possibly empty on success.
    pub log: String,
    /// The program, present exactly when `status` is success.
    pub program: Option<ProgramId>,
}

/// One execution device with a single in-order queue.
pub trait ComputeDevice: Send + Sync {
    /// Identity used in logs and build reports.
    fn identity(&self) -> &DeviceIdentity;

    /// Compile `source`. May block the caller while the compiler runs.
    fn build_program(&self, source: &ProgramSource) -> ProgramBuild;

    /// Drop a compiled program.
    fn release_program(&self, program: ProgramId) -> Result<(), DeviceError>;

    /// Create a kernel for `entry` with `args` bound in order.
    fn create_kernel(
        &self,
        program: ProgramId,
        entry: &str,
        args: &[BufferId],
    ) -> Result<KernelId, DeviceError>;

    /// Drop a kernel.
    fn release_kernel(&self, kernel: KernelId) -> Result<(), DeviceError>;

    /// Allocate `size` bytes of device memory.
    fn allocate(&self, size: u64, access: BufferAccess, label: &str)
    -> Result<BufferId, DeviceError>;

    /// Enqueue a host-to-device copy into the start of `buffer`.
    fn enqueue_write(&self, buffer: BufferId, bytes: Vec<u8>) -> Completion<()>;

    /// Enqueue a kernel launch over the `global` grid.
    fn enqueue_launch(&self, kernel: KernelId, global: [u32; 3]) -> Completion<()>;

    /// Enqueue a device-to-host copy of the whole buffer.
    fn enqueue_read(&self, buffer: BufferId) -> Completion<Vec<u8>>;

    /// Free device memory. Rejected with [`DeviceError::Busy`] while an operation is outstanding.
    fn release_buffer(&self, buffer: BufferId) -> Result<(), DeviceError>;

    /// Number of buffers currently allocated.
    fn live_buffers(&self) -> usize;
}

/// Check `args` against the binding table of `entry`: arity, distinct buffers, access modes.
pub(crate) fn check_kernel_args(
    entry: &KernelEntry,
    args: &[BufferId],
    mut access_of: impl FnMut(BufferId) -> Result<BufferAccess, DeviceError>,
) -> Result<(), DeviceError> {
    if args.len() != entry.args.len() {
        return Err(DeviceError::rejected(
            "create_kernel",
            format!(
                "'{}' takes {} arguments, {} given",
                entry.name,
                entry.args.len(),
                args.len()
            ),
        ));
    }
    for (n, id) in args.iter().enumerate() {
        if args[..n].contains(id) {
            return Err(DeviceError::Access(format!("{id} bound more than once")));
        }
    }
    for (&id, arg) in args.iter().zip(entry.args) {
        let access = access_of(id)?;
        if arg.reads && !access.kernel_readable() {
            return Err(DeviceError::Access(format!(
                "'{}' reads argument '{}' but {id} is {access:?}",
                entry.name, arg.name
            )));
        }
        if arg.writes && !access.kernel_writable() {
            return Err(DeviceError::Access(format!(
                "'{}' writes argument '{}' but {id} is {access:?}",
                entry.name, arg.name
            )));
        }
    }
    Ok(())
}

/// Available device backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Host CPU reference device, always available.
    #[default]
    Host,
    /// wgpu adapters; requires the `gpu` feature.
    Gpu,
}

/// Enumerate every device of a backend.
pub fn enumerate_devices(
    kind: BackendKind,
    host: &HostDeviceOpts,
) -> Result<Vec<Arc<dyn ComputeDevice>>, DeviceError> {
    let devices: Vec<Arc<dyn ComputeDevice>> = match kind {
        BackendKind::Host => host::HostDevice::enumerate(host)?
            .into_iter()
            .map(|d| Arc::new(d) as Arc<dyn ComputeDevice>)
            .collect(),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => gpu::GpuDevice::enumerate()?
            .into_iter()
            .map(|d| Arc::new(d) as Arc<dyn ComputeDevice>)
            .collect(),
        #[cfg(not(feature = "gpu"))]
        BackendKind::Gpu => {
            return Err(DeviceError::Unavailable(
                "gpu backend requires the `gpu` feature".to_owned(),
            ));
        }
    };
    if devices.is_empty() {
        return Err(DeviceError::Unavailable(format!(
            "no {kind:?} devices enumerated"
        )));
    }
    Ok(devices)
}
