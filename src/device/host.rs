//! Host CPU reference device.
//!
//! Programs compile from their manifest with the restricted expression grammar. Enqueued
//! operations are jobs drained in order by one worker thread; kernel bodies fan out on a rayon
//! pool owned by the device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, mpsc};
use std::thread::JoinHandle;

use rayon::prelude::*;

use crate::build::BuildStatus;
use crate::config::HostDeviceOpts;
use crate::device::{
    BufferAccess, BufferId, Completion, ComputeDevice, DeviceError, DeviceIdentity, KernelId,
    PendingOp, ProgramBuild, ProgramId, check_kernel_args,
};
use crate::domain::{COMPONENTS, FLOAT_SIZE, ParamsBlock, Topology};
use crate::expression::{ScalarProgram, VmError, compile_scalar, compile_vec3};
use crate::kernel::source::{
    KernelEntry, MESH_ENTRY, POINTS_ENTRY, ProgramManifest, ProgramSource,
};
use crate::mesh_index::{face_normal, point_index, triangle_coords, triangle_corners};

/// Largest single allocation the host device accepts.
pub const MAX_ALLOCATION: u64 = 1 << 31;

const POINT_BYTES: usize = (COMPONENTS * FLOAT_SIZE) as usize;
const TRIANGLE_BYTES: usize = 3 * POINT_BYTES;

type Job = Box<dyn FnOnce() + Send>;

#[derive(Clone)]
struct HostBuffer {
    id: BufferId,
    data: Arc<RwLock<Vec<u8>>>,
    access: BufferAccess,
    pending: Arc<AtomicUsize>,
}

impl HostBuffer {
    fn begin(&self) -> PendingOp {
        PendingOp::begin(&self.pending)
    }
}

enum KernelBody {
    Points {
        field: ScalarProgram,
        conversion: [ScalarProgram; 3],
    },
    Mesh {
        topology: Topology,
    },
}

struct HostProgram {
    body: KernelBody,
    entries: Vec<KernelEntry>,
}

struct HostKernel {
    program: Arc<HostProgram>,
    args: Vec<HostBuffer>,
}

struct Shared {
    next_id: AtomicU64,
    buffers: Mutex<HashMap<BufferId, HostBuffer>>,
    programs: Mutex<HashMap<ProgramId, Arc<HostProgram>>>,
    kernels: Mutex<HashMap<KernelId, Arc<HostKernel>>>,
    pool: rayon::ThreadPool,
}

impl Shared {
    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A host CPU device with its own queue worker and rayon pool.
pub struct HostDevice {
    identity: DeviceIdentity,
    shared: Arc<Shared>,
    queue: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HostDevice {
    /// Create device number `index` with `threads` kernel threads (rayon default when `None`).
    pub fn new(index: usize, threads: Option<usize>) -> Result<Self, DeviceError> {
        let identity = DeviceIdentity::new(format!("host-cpu:{index}"), "host");
        let pool = build_thread_pool(&identity.name, threads)?;
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = std::thread::Builder::new()
            .name(format!("{}-queue", identity.name))
            .spawn(move || {
                for job in rx {
                    job();
                }
            })
            .map_err(|e| DeviceError::Unavailable(format!("failed to spawn queue worker: {e}")))?;

        Ok(Self {
            identity,
            shared: Arc::new(Shared {
                next_id: AtomicU64::new(1),
                buffers: Mutex::new(HashMap::new()),
                programs: Mutex::new(HashMap::new()),
                kernels: Mutex::new(HashMap::new()),
                pool,
            }),
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Enumerate `opts.devices` host devices named `host-cpu:<n>`.
    pub fn enumerate(opts: &HostDeviceOpts) -> Result<Vec<Self>, DeviceError> {
        if opts.devices == 0 {
            return Err(DeviceError::Unavailable(
                "host device count must be >= 1".to_owned(),
            ));
        }
        (0..opts.devices)
            .map(|index| Self::new(index, opts.threads))
            .collect()
    }

    fn submit<T: Send + 'static>(
        &self,
        job: impl FnOnce() -> Result<T, DeviceError> + Send + 'static,
    ) -> Completion<T> {
        let (tx, rx) = mpsc::sync_channel(1);
        let queue = lock(&self.queue);
        let Some(sender) = queue.as_ref() else {
            return Completion::ready(Err(DeviceError::QueueClosed));
        };
        let sent = sender.send(Box::new(move || {
            let _ = tx.send(job());
        }));
        match sent {
            Ok(()) => Completion::from_channel(rx),
            Err(_) => Completion::ready(Err(DeviceError::QueueClosed)),
        }
    }

    fn buffer(&self, id: BufferId) -> Result<HostBuffer, DeviceError> {
        lock(&self.shared.buffers)
            .get(&id)
            .cloned()
            .ok_or(DeviceError::UnknownHandle {
                kind: "buffer",
                id: id.0,
            })
    }

    fn compile(manifest: &ProgramManifest) -> Result<KernelBody, String> {
        match manifest {
            ProgramManifest::Points(m) => {
                let field = compile_scalar(&m.field, &m.axes);
                let conversion = compile_vec3(&m.conversion, &m.conversion_vars());
                match (field, conversion) {
                    (Ok(field), Ok(conversion)) => Ok(KernelBody::Points { field, conversion }),
                    (field, conversion) => {
                        let mut log = Vec::new();
                        if let Err(e) = field {
                            log.push(e.render("field", &m.field));
                        }
                        if let Err(e) = conversion {
                            log.push(e.render("conversion", &m.conversion));
                        }
                        Err(log.join("\n"))
                    }
                }
            }
            ProgramManifest::Mesh { topology } => Ok(KernelBody::Mesh {
                topology: *topology,
            }),
        }
    }
}

impl Drop for HostDevice {
    fn drop(&mut self) {
        lock(&self.queue).take();
        if let Some(worker) = lock(&self.worker).take()
            && worker.join().is_err()
        {
            tracing::warn!(device = %self.identity.name, "queue worker panicked");
        }
    }
}

impl ComputeDevice for HostDevice {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn build_program(&self, source: &ProgramSource) -> ProgramBuild {
        match Self::compile(&source.manifest) {
            Ok(body) => {
                let id = ProgramId(self.shared.next());
                let program = HostProgram {
                    body,
                    entries: source.entries.clone(),
                };
                lock(&self.shared.programs).insert(id, Arc::new(program));
                ProgramBuild {
                    status: BuildStatus::Success,
                    log: String::new(),
                    program: Some(id),
                }
            }
            Err(log) => ProgramBuild {
                status: BuildStatus::Failure,
                log,
                program: None,
            },
        }
    }

    fn release_program(&self, program: ProgramId) -> Result<(), DeviceError> {
        lock(&self.shared.programs)
            .remove(&program)
            .map(|_| ())
            .ok_or(DeviceError::UnknownHandle {
                kind: "program",
                id: program.0,
            })
    }

    fn create_kernel(
        &self,
        program: ProgramId,
        entry: &str,
        args: &[BufferId],
    ) -> Result<KernelId, DeviceError> {
        let program = lock(&self.shared.programs).get(&program).cloned().ok_or(
            DeviceError::UnknownHandle {
                kind: "program",
                id: program.0,
            },
        )?;
        let Some(kernel_entry) = program.entries.iter().find(|e| e.name == entry) else {
            return Err(DeviceError::rejected(
                "create_kernel",
                format!("program has no entry point '{entry}'"),
            ));
        };
        check_kernel_args(kernel_entry, args, |id| self.buffer(id).map(|b| b.access))?;
        let bound = args
            .iter()
            .map(|&id| self.buffer(id))
            .collect::<Result<Vec<_>, _>>()?;

        let id = KernelId(self.shared.next());
        lock(&self.shared.kernels).insert(
            id,
            Arc::new(HostKernel {
                program,
                args: bound,
            }),
        );
        Ok(id)
    }

    fn release_kernel(&self, kernel: KernelId) -> Result<(), DeviceError> {
        lock(&self.shared.kernels)
            .remove(&kernel)
            .map(|_| ())
            .ok_or(DeviceError::UnknownHandle {
                kind: "kernel",
                id: kernel.0,
            })
    }

    fn allocate(
        &self,
        size: u64,
        access: BufferAccess,
        label: &str,
    ) -> Result<BufferId, DeviceError> {
        if size == 0 {
            return Err(DeviceError::OutOfRange(format!(
                "zero-size allocation '{label}'"
            )));
        }
        if size > MAX_ALLOCATION {
            return Err(DeviceError::OutOfRange(format!(
                "allocation '{label}' of {size} bytes exceeds {MAX_ALLOCATION}"
            )));
        }
        let len = usize::try_from(size)
            .map_err(|_| DeviceError::OutOfRange(format!("allocation '{label}' too large")))?;

        let id = BufferId(self.shared.next());
        lock(&self.shared.buffers).insert(
            id,
            HostBuffer {
                id,
                data: Arc::new(RwLock::new(vec![0u8; len])),
                access,
                pending: Arc::new(AtomicUsize::new(0)),
            },
        );
        tracing::trace!(device = %self.identity.name, %id, size, label, "allocated");
        Ok(id)
    }

    fn enqueue_write(&self, buffer: BufferId, bytes: Vec<u8>) -> Completion<()> {
        let target = match self.buffer(buffer) {
            Ok(b) => b,
            Err(e) => return Completion::ready(Err(e)),
        };
        let capacity = target
            .data
            .read()
            .map(|d| d.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());
        if bytes.len() > capacity {
            return Completion::ready(Err(DeviceError::OutOfRange(format!(
                "write of {} bytes into {buffer} of {capacity} bytes",
                bytes.len()
            ))));
        }

        let pending = target.begin();
        self.submit(move || {
            let _pending = pending;
            let mut data = target
                .data
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            data[..bytes.len()].copy_from_slice(&bytes);
            Ok(())
        })
    }

    fn enqueue_launch(&self, kernel: KernelId, global: [u32; 3]) -> Completion<()> {
        let Some(kernel) = lock(&self.shared.kernels).get(&kernel).cloned() else {
            return Completion::ready(Err(DeviceError::UnknownHandle {
                kind: "kernel",
                id: kernel.0,
            }));
        };
        {
            let buffers = lock(&self.shared.buffers);
            if let Some(gone) = kernel.args.iter().find(|a| !buffers.contains_key(&a.id)) {
                return Completion::ready(Err(DeviceError::UnknownHandle {
                    kind: "buffer",
                    id: gone.id.0,
                }));
            }
        }

        let pending = kernel.args.iter().map(HostBuffer::begin).collect::<Vec<_>>();
        let shared = Arc::clone(&self.shared);
        self.submit(move || {
            let _pending = pending;
            shared.pool.install(|| run_kernel(&kernel, global))
        })
    }

    fn enqueue_read(&self, buffer: BufferId) -> Completion<Vec<u8>> {
        let source = match self.buffer(buffer) {
            Ok(b) => b,
            Err(e) => return Completion::ready(Err(e)),
        };
        let pending = source.begin();
        self.submit(move || {
            let _pending = pending;
            let data = source
                .data
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Ok(data.clone())
        })
    }

    fn release_buffer(&self, buffer: BufferId) -> Result<(), DeviceError> {
        let mut buffers = lock(&self.shared.buffers);
        let Some(entry) = buffers.get(&buffer) else {
            return Err(DeviceError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            });
        };
        if entry.pending.load(Ordering::Acquire) > 0 {
            return Err(DeviceError::Busy(buffer));
        }
        buffers.remove(&buffer);
        Ok(())
    }

    fn live_buffers(&self) -> usize {
        lock(&self.shared.buffers).len()
    }
}

fn build_thread_pool(name: &str, threads: Option<usize>) -> Result<rayon::ThreadPool, DeviceError> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(DeviceError::Unavailable(
            "host device 'threads' must be >= 1 when set".to_owned(),
        ));
    }

    let prefix = name.to_owned();
    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(move |i| format!("{prefix}-kernel-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| DeviceError::Unavailable(format!("failed to build rayon thread pool: {e}")))
}

fn run_kernel(kernel: &HostKernel, global: [u32; 3]) -> Result<(), DeviceError> {
    if global.contains(&0) {
        return Err(DeviceError::OutOfRange(format!(
            "empty launch grid {global:?}"
        )));
    }
    match &kernel.program.body {
        KernelBody::Points { field, conversion } => {
            run_points(field, conversion, &kernel.args[0], &kernel.args[1], global)
        }
        KernelBody::Mesh { topology } => run_mesh(
            *topology,
            &kernel.args[0],
            &kernel.args[1],
            &kernel.args[2],
            global,
        ),
    }
}

fn required_len(op: &str, count: u64, unit: usize, have: usize) -> Result<usize, DeviceError> {
    let need = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(unit))
        .ok_or_else(|| DeviceError::OutOfRange(format!("{op}: launch grid too large")))?;
    if need > have {
        return Err(DeviceError::OutOfRange(format!(
            "{op}: grid needs {need} bytes, buffer holds {have}"
        )));
    }
    Ok(need)
}

fn run_points(
    field: &ScalarProgram,
    conversion: &[ScalarProgram; 3],
    points: &HostBuffer,
    params: &HostBuffer,
    global: [u32; 3],
) -> Result<(), DeviceError> {
    let [gx, gy, gz] = global;
    if gz != 1 {
        return Err(DeviceError::OutOfRange(format!(
            "{POINTS_ENTRY} expects a 2-D grid, got {global:?}"
        )));
    }
    let params = {
        let data = params
            .data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ParamsBlock::from_le_bytes(&data).ok_or_else(|| {
            DeviceError::OutOfRange(format!(
                "params buffer holds {} bytes, {} required",
                data.len(),
                ParamsBlock::SIZE
            ))
        })?
    };

    let mut data = points
        .data
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let need = required_len(
        POINTS_ENTRY,
        u64::from(gx) * u64::from(gy),
        POINT_BYTES,
        data.len(),
    )?;
    let stack_depth = conversion
        .iter()
        .map(ScalarProgram::max_stack)
        .fold(field.max_stack(), usize::max);

    data[..need]
        .par_chunks_mut(POINT_BYTES)
        .enumerate()
        .try_for_each_init(
            || Vec::with_capacity(stack_depth),
            |stack, (idx, out)| -> Result<(), VmError> {
                let idx = idx as u32;
                let (a0, a1) = params.sample(idx % gx, idx / gx);
                let value = field.eval(&[a0, a1], stack)?;
                let inputs = [value, a0, a1];
                for (c, program) in out.chunks_exact_mut(4).zip(conversion) {
                    c.copy_from_slice(&program.eval(&inputs, stack)?.to_le_bytes());
                }
                Ok(())
            },
        )
        .map_err(|e| DeviceError::rejected("launch", e.message))
}

fn run_mesh(
    topology: Topology,
    points: &HostBuffer,
    vertices: &HostBuffer,
    normals: &HostBuffer,
    global: [u32; 3],
) -> Result<(), DeviceError> {
    let [gx, gy, gz] = global;
    if gz != 2 {
        return Err(DeviceError::OutOfRange(format!(
            "{MESH_ENTRY} expects two triangles per quad, got {global:?}"
        )));
    }
    let stride = gx + topology.extra_samples();

    let points = points
        .data
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    required_len(
        MESH_ENTRY,
        u64::from(stride) * (u64::from(gy) + 1),
        POINT_BYTES,
        points.len(),
    )?;
    let mut vertices = vertices
        .data
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut normals = normals
        .data
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let triangles = u64::from(gx) * u64::from(gy) * 2;
    let need = required_len(MESH_ENTRY, triangles, TRIANGLE_BYTES, vertices.len())?;
    required_len(MESH_ENTRY, triangles, TRIANGLE_BYTES, normals.len())?;

    vertices[..need]
        .par_chunks_mut(TRIANGLE_BYTES)
        .zip(normals[..need].par_chunks_mut(TRIANGLE_BYTES))
        .enumerate()
        .for_each(|(ti, (v_out, n_out))| {
            let (i, j, t) = triangle_coords(ti as u32, gx);
            let corners = triangle_corners(i, j, t)
                .map(|(ci, cj)| load_point(&points, point_index(ci, cj, stride, topology)));
            let normal = face_normal(corners[0], corners[1], corners[2]);
            for (k, corner) in corners.iter().enumerate() {
                store3(&mut v_out[k * POINT_BYTES..(k + 1) * POINT_BYTES], *corner);
                store3(&mut n_out[k * POINT_BYTES..(k + 1) * POINT_BYTES], normal);
            }
        });
    Ok(())
}

fn load_point(bytes: &[u8], index: u32) -> [f32; 3] {
    let base = index as usize * POINT_BYTES;
    let mut p = [0.0f32; 3];
    for (k, c) in bytes[base..base + POINT_BYTES].chunks_exact(4).enumerate() {
        p[k] = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
    }
    p
}

fn store3(out: &mut [u8], v: [f32; 3]) {
    for (c, x) in out.chunks_exact_mut(4).zip(v) {
        c.copy_from_slice(&x.to_le_bytes());
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/host.rs"]
mod tests;
