//! Device buffers owned by one request.

use std::fmt;
use std::sync::Arc;

use crate::device::{BufferAccess, BufferId, Completion, ComputeDevice, DeviceError};

/// A device allocation released when the guard goes away.
///
/// Call [`DeviceBuffer::release`] on the success path to observe release errors; dropping the guard
/// releases it as well and only logs failures.
pub struct DeviceBuffer {
    device: Arc<dyn ComputeDevice>,
    id: BufferId,
    size: u64,
    access: BufferAccess,
    label: String,
    live: bool,
}

impl DeviceBuffer {
    /// Allocate `size` bytes on `device`.
    pub fn allocate(
        device: &Arc<dyn ComputeDevice>,
        size: u64,
        access: BufferAccess,
        label: &str,
    ) -> Result<Self, DeviceError> {
        let id = device.allocate(size, access, label)?;
        Ok(Self {
            device: Arc::clone(device),
            id,
            size,
            access,
            label: label.to_owned(),
            live: true,
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn access(&self) -> BufferAccess {
        self.access
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueue a host-to-device copy.
    pub fn write(&self, bytes: Vec<u8>) -> Completion<()> {
        self.device.enqueue_write(self.id, bytes)
    }

    /// Enqueue a device-to-host copy of the whole buffer.
    pub fn read(&self) -> Completion<Vec<u8>> {
        self.device.enqueue_read(self.id)
    }

    /// Release now. Rejected with [`DeviceError::Busy`] while an operation is outstanding; the
    /// guard then retries once on drop.
    pub fn release(mut self) -> Result<(), DeviceError> {
        let result = self.device.release_buffer(self.id);
        if result.is_ok() {
            self.live = false;
        }
        result
    }
}

impl fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("access", &self.access)
            .field("label", &self.label)
            .finish()
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if self.live
            && let Err(e) = self.device.release_buffer(self.id)
        {
            tracing::warn!(
                buffer = %self.id,
                label = %self.label,
                device = %self.device.identity().name,
                "release on drop failed: {e}"
            );
        }
    }
}

/// Decode little-endian `f32` values. Trailing bytes that do not form a full float are dropped.
pub fn decode_f32_le(bytes: &[u8]) -> Vec<f32> {
    let chunks = bytes.chunks_exact(4);
    let trailing = chunks.remainder().len();
    if trailing != 0 {
        tracing::warn!(
            len = bytes.len(),
            trailing,
            "dropping trailing bytes that do not form a full f32"
        );
    }
    chunks
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
#[path = "../tests/unit/buffers.rs"]
mod tests;
