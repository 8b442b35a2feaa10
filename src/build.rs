//! Compiling programs on every device and owning the result.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::device::{
    BufferId, Completion, ComputeDevice, DeviceError, DeviceIdentity, KernelId, ProgramId,
};
use crate::kernel::source::ProgramSource;

/// Outcome of compiling a program on one device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// The device accepted the program.
    Success,
    /// The device compiler rejected the program.
    Failure,
}

/// Per-device build outcome with the compiler log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Device the program was compiled for.
    pub device: DeviceIdentity,
    /// Success or failure.
    pub status: BuildStatus,
    /// Compiler diagnostics.
    pub log: String,
}

impl BuildReport {
    /// Whether the build succeeded.
    pub fn succeeded(&self) -> bool {
        self.status == BuildStatus::Success
    }
}

/// A program that failed to build on at least one device.
///
/// Carries the report of every device, including the ones that succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    /// Label of the program.
    pub program: String,
    /// One report per enumerated device.
    pub reports: Vec<BuildReport>,
}

impl BuildFailure {
    /// Reports of the devices that rejected the program.
    pub fn failed(&self) -> impl Iterator<Item = &BuildReport> {
        self.reports.iter().filter(|r| !r.succeeded())
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "build of '{}' failed on {} of {} device(s)",
            self.program,
            self.failed().count(),
            self.reports.len()
        )?;
        for report in self.failed() {
            write!(f, "\n  {}:", report.device)?;
            if report.log.trim().is_empty() {
                write!(f, " (no log)")?;
            }
            for line in report.log.lines() {
                write!(f, "\n    {line}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for BuildFailure {}

/// A program built on every device. Released on drop.
pub struct Program {
    label: String,
    builds: Vec<(Arc<dyn ComputeDevice>, ProgramId)>,
    reports: Vec<BuildReport>,
}

impl Program {
    /// Label of the source the program was built from.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Per-device reports, all successful.
    pub fn reports(&self) -> &[BuildReport] {
        &self.reports
    }

    /// Program handle on `device`, if `device` is one the program was built for.
    pub fn id_on(&self, device: &Arc<dyn ComputeDevice>) -> Option<ProgramId> {
        self.builds
            .iter()
            .find(|(d, _)| Arc::ptr_eq(d, device))
            .map(|(_, id)| *id)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("label", &self.label)
            .field("devices", &self.builds.len())
            .finish()
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        for (device, id) in self.builds.drain(..) {
            if let Err(e) = device.release_program(id) {
                tracing::warn!(program = %self.label, device = %device.identity(), "release failed: {e}");
            }
        }
    }
}

/// Compile `source` on every device.
///
/// The program is usable only if every device accepts it; otherwise the partial builds are
/// released and every report is returned.
pub fn build_program(
    devices: &[Arc<dyn ComputeDevice>],
    source: &ProgramSource,
) -> Result<Program, BuildFailure> {
    let outcomes = devices
        .par_iter()
        .map(|device| (Arc::clone(device), device.build_program(source)))
        .collect::<Vec<_>>();

    let mut program = Program {
        label: source.label.clone(),
        builds: Vec::with_capacity(outcomes.len()),
        reports: Vec::with_capacity(outcomes.len()),
    };
    for (device, outcome) in outcomes {
        let identity = device.identity().clone();
        match (outcome.status, outcome.program) {
            (BuildStatus::Success, Some(id)) => {
                tracing::info!(program = %source.label, "Build on {}: ✓", identity.name);
                program.builds.push((device, id));
                program.reports.push(BuildReport {
                    device: identity,
                    status: BuildStatus::Success,
                    log: outcome.log,
                });
            }
            (status, id) => {
                // A failed build should not hand out a program; drop it anyway.
                if let Some(id) = id
                    && let Err(e) = device.release_program(id)
                {
                    tracing::warn!(program = %source.label, device = %identity, "release failed: {e}");
                }
                tracing::error!(
                    program = %source.label,
                    ?status,
                    "Build on {}: ✗\n{}",
                    identity.name,
                    outcome.log
                );
                program.reports.push(BuildReport {
                    device: identity,
                    status: BuildStatus::Failure,
                    log: outcome.log,
                });
            }
        }
    }

    if program.reports.iter().all(BuildReport::succeeded) && !program.reports.is_empty() {
        Ok(program)
    } else {
        Err(BuildFailure {
            program: source.label.clone(),
            reports: std::mem::take(&mut program.reports),
        })
    }
}

/// A kernel bound to its arguments on one device. Released on drop.
pub struct Kernel {
    device: Arc<dyn ComputeDevice>,
    id: KernelId,
    live: bool,
}

impl Kernel {
    /// Create kernel `entry` of `program` on `device` with `args` bound in order.
    pub fn create(
        device: &Arc<dyn ComputeDevice>,
        program: ProgramId,
        entry: &str,
        args: &[BufferId],
    ) -> Result<Self, DeviceError> {
        let id = device.create_kernel(program, entry, args)?;
        Ok(Self {
            device: Arc::clone(device),
            id,
            live: true,
        })
    }

    /// Enqueue a launch over `global`.
    pub fn launch(&self, global: [u32; 3]) -> Completion<()> {
        self.device.enqueue_launch(self.id, global)
    }

    /// Release the kernel now, reporting failures.
    pub fn release(mut self) -> Result<(), DeviceError> {
        self.live = false;
        self.device.release_kernel(self.id)
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        if self.live
            && let Err(e) = self.device.release_kernel(self.id)
        {
            tracing::warn!(kernel = %self.id, "release on drop failed: {e}");
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/build.rs"]
mod tests;
