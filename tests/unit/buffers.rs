use super::*;
use crate::device::host::HostDevice;

fn host() -> Arc<dyn ComputeDevice> {
    Arc::new(HostDevice::new(0, Some(1)).unwrap())
}

#[test]
fn decode_reads_little_endian_floats() {
    let mut bytes = Vec::new();
    for v in [1.5f32, -2.0, 0.25] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    assert_eq!(decode_f32_le(&bytes), vec![1.5, -2.0, 0.25]);
}

#[test]
fn decode_drops_partial_trailing_float() {
    let mut bytes = 7.0f32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0xff, 0xff]);
    assert_eq!(decode_f32_le(&bytes), vec![7.0]);
    assert!(decode_f32_le(&[1, 2, 3]).is_empty());
}

#[test]
fn guard_releases_on_drop() {
    let device = host();
    {
        let a = DeviceBuffer::allocate(&device, 16, BufferAccess::ReadOnly, "params").unwrap();
        let _b = DeviceBuffer::allocate(&device, 32, BufferAccess::WriteOnly, "vertices").unwrap();
        assert_eq!(device.live_buffers(), 2);
        a.release().unwrap();
        assert_eq!(device.live_buffers(), 1);
    }
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn guard_reads_back_what_it_wrote() {
    let device = host();
    let buf = DeviceBuffer::allocate(&device, 8, BufferAccess::ReadWrite, "scratch").unwrap();
    assert_eq!(buf.size(), 8);
    assert_eq!(buf.label(), "scratch");
    buf.write(2.5f32.to_le_bytes().to_vec()).wait().unwrap();
    let out = decode_f32_le(&buf.read().wait().unwrap());
    assert_eq!(out, vec![2.5, 0.0]);
}

#[test]
fn zero_size_allocation_is_rejected() {
    let device = host();
    let err = DeviceBuffer::allocate(&device, 0, BufferAccess::ReadWrite, "empty").unwrap_err();
    assert!(matches!(err, DeviceError::OutOfRange(_)));
    assert_eq!(device.live_buffers(), 0);
}
