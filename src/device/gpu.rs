//! wgpu compute device, one per adapter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, mpsc};

use crate::build::BuildStatus;
use crate::device::{
    BufferAccess, BufferId, Completion, ComputeDevice, DeviceError, DeviceIdentity, KernelId,
    PendingOp, ProgramBuild, ProgramId, check_kernel_args,
};
use crate::kernel::source::{KernelEntry, ProgramSource};

const LAUNCH_EXTENT_SIZE: u64 = 16;

struct GpuBuffer {
    buffer: wgpu::Buffer,
    size: u64,
    access: BufferAccess,
    pending: Arc<AtomicUsize>,
}

struct GpuProgram {
    pipelines: Vec<(KernelEntry, wgpu::ComputePipeline)>,
}

struct GpuKernel {
    entry: KernelEntry,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    args: Vec<BufferId>,
}

#[derive(Default)]
struct Objects {
    buffers: HashMap<BufferId, GpuBuffer>,
    programs: HashMap<ProgramId, Arc<GpuProgram>>,
    kernels: HashMap<KernelId, Arc<GpuKernel>>,
}

/// A wgpu device and its queue.
pub struct GpuDevice {
    identity: DeviceIdentity,
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: AtomicU64,
    objects: Mutex<Objects>,
}

impl GpuDevice {
    /// Open one device per adapter the instance enumerates.
    pub fn enumerate() -> Result<Vec<Self>, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let mut devices = Vec::new();
        for adapter in instance.enumerate_adapters(wgpu::Backends::all()) {
            let info = adapter.get_info();
            match pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
                label: Some("paramesh_device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })) {
                Ok((device, queue)) => devices.push(Self {
                    identity: DeviceIdentity::new(info.name, format!("{:?}", info.backend)),
                    device,
                    queue,
                    next_id: AtomicU64::new(1),
                    objects: Mutex::new(Objects::default()),
                }),
                Err(e) => {
                    tracing::warn!(adapter = %info.name, "wgpu request_device failed: {e:?}");
                }
            }
        }
        if devices.is_empty() {
            return Err(DeviceError::Unavailable(
                "no gpu adapter available".to_owned(),
            ));
        }
        Ok(devices)
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn objects(&self) -> MutexGuard<'_, Objects> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` inside validation and out-of-memory error scopes.
    fn scoped<T>(&self, op: &'static str, f: impl FnOnce() -> T) -> Result<T, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match validation.or(oom) {
            Some(e) => Err(DeviceError::rejected(op, e.to_string())),
            None => Ok(out),
        }
    }

    fn buffer_handle(&self, id: BufferId) -> Result<(wgpu::Buffer, u64, PendingOp), DeviceError> {
        let objects = self.objects();
        let b = objects
            .buffers
            .get(&id)
            .ok_or(DeviceError::UnknownHandle {
                kind: "buffer",
                id: id.0,
            })?;
        Ok((b.buffer.clone(), b.size, PendingOp::begin(&b.pending)))
    }

    /// Completion that resolves once all work submitted so far has finished.
    fn submitted(&self, pending: Vec<PendingOp>) -> Completion<()> {
        let (tx, rx) = mpsc::channel();
        self.queue.on_submitted_work_done(move || {
            drop(pending);
            let _ = tx.send(());
        });
        let device = self.device.clone();
        Completion::from_fn(move || {
            device
                .poll(wgpu::PollType::wait_indefinitely())
                .map_err(|e| DeviceError::rejected("poll", format!("{e:?}")))?;
            rx.recv().map_err(|_| DeviceError::QueueClosed)
        })
    }

    fn workgroups(&self, entry: &KernelEntry, global: [u32; 3]) -> Result<[u32; 3], DeviceError> {
        let max = self.device.limits().max_compute_workgroups_per_dimension;
        let mut groups = [0u32; 3];
        for axis in 0..3 {
            groups[axis] = global[axis].div_ceil(entry.workgroup_size[axis]);
            if groups[axis] > max {
                return Err(DeviceError::OutOfRange(format!(
                    "launch grid {global:?} needs {} workgroups on axis {axis}, device allows {max}",
                    groups[axis]
                )));
            }
        }
        Ok(groups)
    }
}

fn render_compilation_info(label: &str, info: &wgpu::CompilationInfo) -> (bool, String) {
    let mut failed = false;
    let mut log = Vec::new();
    for msg in &info.messages {
        let kind = match msg.message_type {
            wgpu::CompilationMessageType::Error => {
                failed = true;
                "error"
            }
            wgpu::CompilationMessageType::Warning => "warning",
            wgpu::CompilationMessageType::Info => "info",
        };
        match &msg.location {
            Some(loc) => log.push(format!(
                "{kind}: {}\n --> {label}:{}:{}",
                msg.message, loc.line_number, loc.line_position
            )),
            None => log.push(format!("{kind}: {}", msg.message)),
        }
    }
    (failed, log.join("\n"))
}

fn usages(access: BufferAccess) -> wgpu::BufferUsages {
    match access {
        BufferAccess::ReadOnly => {
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST
        }
        BufferAccess::WriteOnly => wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        BufferAccess::ReadWrite => {
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST
        }
    }
}

fn aligned(size: u64) -> u64 {
    size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}

impl ComputeDevice for GpuDevice {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn build_program(&self, source: &ProgramSource) -> ProgramBuild {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.label.as_str()),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
            });
        let info = pollster::block_on(module.get_compilation_info());
        let (failed, mut log) = render_compilation_info(&source.label, &info);

        let mut pipelines = Vec::with_capacity(source.entries.len());
        if !failed {
            for entry in &source.entries {
                let pipeline =
                    self.device
                        .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                            label: Some(entry.name),
                            layout: None,
                            module: &module,
                            entry_point: Some(entry.name),
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                            cache: None,
                        });
                pipelines.push((*entry, pipeline));
            }
        }
        let scope = pollster::block_on(self.device.pop_error_scope());
        if let Some(e) = &scope {
            if !log.is_empty() {
                log.push('\n');
            }
            log.push_str(&e.to_string());
        }

        if failed || scope.is_some() {
            return ProgramBuild {
                status: BuildStatus::Failure,
                log,
                program: None,
            };
        }
        let id = ProgramId(self.next());
        self.objects()
            .programs
            .insert(id, Arc::new(GpuProgram { pipelines }));
        ProgramBuild {
            status: BuildStatus::Success,
            log,
            program: Some(id),
        }
    }

    fn release_program(&self, program: ProgramId) -> Result<(), DeviceError> {
        self.objects()
            .programs
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
        let mut objects = self.objects();
        let program = objects
            .programs
            .get(&program)
            .cloned()
            .ok_or(DeviceError::UnknownHandle {
                kind: "program",
                id: program.0,
            })?;
        let Some((kernel_entry, pipeline)) = program.pipelines.iter().find(|(e, _)| e.name == entry)
        else {
            return Err(DeviceError::rejected(
                "create_kernel",
                format!("program has no entry point '{entry}'"),
            ));
        };
        check_kernel_args(kernel_entry, args, |id| {
            objects
                .buffers
                .get(&id)
                .map(|b| b.access)
                .ok_or(DeviceError::UnknownHandle {
                    kind: "buffer",
                    id: id.0,
                })
        })?;

        let entries = args
            .iter()
            .enumerate()
            .filter_map(|(binding, id)| {
                objects.buffers.get(id).map(|b| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: b.buffer.as_entire_binding(),
                })
            })
            .collect::<Vec<_>>();
        let bind_group = self.scoped("create_kernel", || {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(entry),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &entries,
            })
        })?;

        let id = KernelId(self.next());
        let kernel = GpuKernel {
            entry: *kernel_entry,
            pipeline: pipeline.clone(),
            bind_group,
            args: args.to_vec(),
        };
        objects.kernels.insert(id, Arc::new(kernel));
        Ok(id)
    }

    fn release_kernel(&self, kernel: KernelId) -> Result<(), DeviceError> {
        self.objects()
            .kernels
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
        let limits = self.device.limits();
        let max = limits
            .max_buffer_size
            .min(u64::from(limits.max_storage_buffer_binding_size));
        if aligned(size) > max {
            return Err(DeviceError::OutOfRange(format!(
                "allocation '{label}' of {size} bytes exceeds the device limit of {max}"
            )));
        }
        let buffer = self.scoped("allocate", || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: aligned(size),
                usage: usages(access),
                mapped_at_creation: false,
            })
        })?;

        let id = BufferId(self.next());
        self.objects().buffers.insert(
            id,
            GpuBuffer {
                buffer,
                size,
                access,
                pending: Arc::new(AtomicUsize::new(0)),
            },
        );
        Ok(id)
    }

    fn enqueue_write(&self, buffer: BufferId, mut bytes: Vec<u8>) -> Completion<()> {
        let (target, size, pending) = match self.buffer_handle(buffer) {
            Ok(h) => h,
            Err(e) => return Completion::ready(Err(e)),
        };
        if bytes.len() as u64 > size {
            return Completion::ready(Err(DeviceError::OutOfRange(format!(
                "write of {} bytes into {buffer} of {size} bytes",
                bytes.len()
            ))));
        }
        bytes.resize(aligned(bytes.len() as u64) as usize, 0);
        if let Err(e) = self.scoped("write", || {
            self.queue.write_buffer(&target, 0, &bytes);
            self.queue.submit([]);
        }) {
            return Completion::ready(Err(e));
        }
        self.submitted(vec![pending])
    }

    fn enqueue_launch(&self, kernel: KernelId, global: [u32; 3]) -> Completion<()> {
        let (kernel, pending) = {
            let objects = self.objects();
            let Some(kernel) = objects.kernels.get(&kernel).cloned() else {
                return Completion::ready(Err(DeviceError::UnknownHandle {
                    kind: "kernel",
                    id: kernel.0,
                }));
            };
            let mut pending = Vec::with_capacity(kernel.args.len());
            for id in &kernel.args {
                match objects.buffers.get(id) {
                    Some(b) => pending.push(PendingOp::begin(&b.pending)),
                    None => {
                        return Completion::ready(Err(DeviceError::UnknownHandle {
                            kind: "buffer",
                            id: id.0,
                        }));
                    }
                }
            }
            (kernel, pending)
        };
        if global.contains(&0) {
            return Completion::ready(Err(DeviceError::OutOfRange(format!(
                "empty launch grid {global:?}"
            ))));
        }
        let [x, y, z] = match self.workgroups(&kernel.entry, global) {
            Ok(groups) => groups,
            Err(e) => return Completion::ready(Err(e)),
        };

        let mut extent = Vec::with_capacity(LAUNCH_EXTENT_SIZE as usize);
        for v in [global[0], global[1], global[2], 0] {
            extent.extend_from_slice(&v.to_le_bytes());
        }
        let submitted = self.scoped("launch", || {
            let launch = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("paramesh_launch_extent"),
                size: LAUNCH_EXTENT_SIZE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.queue.write_buffer(&launch, 0, &extent);
            let launch_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("paramesh_launch_extent"),
                layout: &kernel.pipeline.get_bind_group_layout(1),
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: launch.as_entire_binding(),
                }],
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some(kernel.entry.name),
                });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(kernel.entry.name),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&kernel.pipeline);
                pass.set_bind_group(0, &kernel.bind_group, &[]);
                pass.set_bind_group(1, &launch_group, &[]);
                pass.dispatch_workgroups(x, y, z);
            }
            self.queue.submit(Some(encoder.finish()));
        });
        match submitted {
            Ok(()) => self.submitted(pending),
            Err(e) => Completion::ready(Err(e)),
        }
    }

    fn enqueue_read(&self, buffer: BufferId) -> Completion<Vec<u8>> {
        let (source, size, pending) = match self.buffer_handle(buffer) {
            Ok(h) => h,
            Err(e) => return Completion::ready(Err(e)),
        };
        let staged = self.scoped("read", || {
            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("paramesh_readback"),
                size: aligned(size),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("paramesh_readback_encoder"),
                });
            encoder.copy_buffer_to_buffer(&source, 0, &staging, 0, aligned(size));
            self.queue.submit(Some(encoder.finish()));
            staging
        });
        let staging = match staged {
            Ok(staging) => staging,
            Err(e) => return Completion::ready(Err(e)),
        };

        let (tx, rx) = mpsc::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |res| {
                drop(pending);
                let _ = tx.send(res);
            });
        let device = self.device.clone();
        Completion::from_fn(move || {
            device
                .poll(wgpu::PollType::wait_indefinitely())
                .map_err(|e| DeviceError::rejected("poll", format!("{e:?}")))?;
            rx.recv()
                .map_err(|_| DeviceError::QueueClosed)?
                .map_err(|e| DeviceError::rejected("read", format!("readback map failed: {e:?}")))?;
            let out = {
                let mapped = staging.slice(..).get_mapped_range();
                mapped[..size as usize].to_vec()
            };
            staging.unmap();
            staging.destroy();
            Ok(out)
        })
    }

    fn release_buffer(&self, buffer: BufferId) -> Result<(), DeviceError> {
        let mut objects = self.objects();
        let Some(entry) = objects.buffers.get(&buffer) else {
            return Err(DeviceError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            });
        };
        if entry.pending.load(Ordering::Acquire) > 0 {
            return Err(DeviceError::Busy(buffer));
        }
        if let Some(entry) = objects.buffers.remove(&buffer) {
            entry.buffer.destroy();
        }
        Ok(())
    }

    fn live_buffers(&self) -> usize {
        self.objects().buffers.len()
    }
}
