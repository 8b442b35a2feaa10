use super::*;
use crate::device::BufferAccess;
use crate::device::host::HostDevice;
use crate::domain::{DomainDescriptor, SurfaceSpec, Topology};
use crate::kernel::source::{MESH_ENTRY, mesh_source, point_source};

fn hosts(n: usize) -> Vec<Arc<dyn ComputeDevice>> {
    (0..n)
        .map(|i| Arc::new(HostDevice::new(i, Some(1)).unwrap()) as Arc<dyn ComputeDevice>)
        .collect()
}

fn report(name: &str, status: BuildStatus, log: &str) -> BuildReport {
    BuildReport {
        device: DeviceIdentity::new(name, "host"),
        status,
        log: log.to_owned(),
    }
}

#[test]
fn program_builds_on_every_device() {
    let devices = hosts(2);
    let program = build_program(&devices, &mesh_source(Topology::Open)).unwrap();
    assert_eq!(program.label(), "mesh:open");
    assert_eq!(program.reports().len(), 2);
    assert!(program.reports().iter().all(BuildReport::succeeded));
    for device in &devices {
        assert!(program.id_on(device).is_some());
    }
    let stranger = hosts(1).remove(0);
    assert!(program.id_on(&stranger).is_none());
}

#[test]
fn failure_carries_a_report_per_device() {
    let devices = hosts(2);
    let spec = SurfaceSpec::cylindrical(
        DomainDescriptor::new(0.0, 1.0, 1),
        DomainDescriptor::new(0.0, 1.0, 1),
        "phi *",
    );
    let failure = build_program(&devices, &point_source(&spec)).unwrap_err();
    assert_eq!(failure.program, "points:cylindrical");
    assert_eq!(failure.reports.len(), 2);
    assert_eq!(failure.failed().count(), 2);
    assert_eq!(failure.reports[0].device.name, "host-cpu:0");
    assert_eq!(failure.reports[1].device.name, "host-cpu:1");
}

#[test]
fn no_devices_is_a_failure() {
    let failure = build_program(&[], &mesh_source(Topology::Closed)).unwrap_err();
    assert!(failure.reports.is_empty());
}

#[test]
fn display_lists_failed_devices_with_indented_logs() {
    let failure = BuildFailure {
        program: "points:parametric".to_owned(),
        reports: vec![
            report("host-cpu:0", BuildStatus::Success, ""),
            report("host-cpu:1", BuildStatus::Failure, "error: bad\n --> field:1:3"),
        ],
    };
    assert_eq!(
        failure.to_string(),
        "build of 'points:parametric' failed on 1 of 2 device(s)\n  host-cpu:1 (host):\n    error: bad\n     --> field:1:3"
    );
}

#[test]
fn kernel_guard_releases_on_drop() {
    let devices = hosts(1);
    let device = &devices[0];
    let program = build_program(&devices, &mesh_source(Topology::Open)).unwrap();
    let id = program.id_on(device).unwrap();
    let args = [
        device.allocate(48, BufferAccess::ReadWrite, "points").unwrap(),
        device.allocate(72, BufferAccess::WriteOnly, "vertices").unwrap(),
        device.allocate(72, BufferAccess::WriteOnly, "normals").unwrap(),
    ];

    let kernel = Kernel::create(device, id, MESH_ENTRY, &args).unwrap();
    let raw = kernel.id;
    drop(kernel);
    assert!(device.release_kernel(raw).is_err());

    let kernel = Kernel::create(device, id, MESH_ENTRY, &args).unwrap();
    kernel.launch([1, 1, 2]).wait().unwrap();
    kernel.release().unwrap();
}
