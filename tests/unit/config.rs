use super::*;

#[test]
fn empty_object_yields_defaults() {
    let s = ContextSettings::from_reader("{}".as_bytes()).unwrap();
    assert_eq!(s, ContextSettings::default());
    assert_eq!(s.backend, BackendKind::Host);
    assert_eq!(s.host.devices, 1);
    assert!(!s.validate_expressions);
}

#[test]
fn fields_override_defaults() {
    let s = ContextSettings::from_reader(
        r#"{"backend":"gpu","device":1,"validate_expressions":true,"host":{"threads":3}}"#
            .as_bytes(),
    )
    .unwrap();
    assert_eq!(s.backend, BackendKind::Gpu);
    assert_eq!(s.device, 1);
    assert!(s.validate_expressions);
    assert_eq!(s.host.devices, 1);
    assert_eq!(s.host.threads, Some(3));
}

#[test]
fn unknown_fields_are_rejected() {
    let err = ContextSettings::from_reader(r#"{"backend":"host","gpus":2}"#.as_bytes())
        .unwrap_err();
    assert!(matches!(err, MeshError::Serde(_)));
    assert!(err.to_string().contains("gpus"));
}

#[test]
fn missing_file_is_a_validation_error() {
    let err = ContextSettings::from_json_file("/nonexistent/paramesh-settings.json").unwrap_err();
    assert!(matches!(err, MeshError::Validation(_)));
}
