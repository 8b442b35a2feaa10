use super::*;
use crate::build::{BuildReport, BuildStatus};
use crate::device::DeviceIdentity;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        MeshError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        MeshError::expression("x")
            .to_string()
            .contains("expression error:")
    );
    assert!(
        MeshError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
    assert!(
        MeshError::Device(DeviceError::QueueClosed)
            .to_string()
            .contains("device operation failed:")
    );
}

#[test]
fn cancelled_names_the_stage() {
    let err = MeshError::Cancelled {
        stage: Stage::MeshComputing,
    };
    assert_eq!(err.to_string(), "request cancelled before mesh computing");
}

#[test]
fn build_failure_is_reachable_from_the_error() {
    let failure = BuildFailure {
        program: "points".to_owned(),
        reports: vec![BuildReport {
            device: DeviceIdentity::new("host-cpu:0", "host"),
            status: BuildStatus::Failure,
            log: "error: boom".to_owned(),
        }],
    };
    let err = MeshError::from(failure);
    let failure = err.as_build_failure().expect("build failure");
    assert_eq!(failure.failed().count(), 1);
    assert!(err.to_string().contains("host-cpu:0"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = MeshError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
