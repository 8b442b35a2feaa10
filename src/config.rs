//! Context settings, built in code or loaded from JSON.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::BackendKind;
use crate::foundation::error::{MeshError, MeshResult};

/// Host reference device options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostDeviceOpts {
    /// Number of host devices to enumerate.
    pub devices: usize,
    /// Kernel threads per device; rayon's default when unset.
    pub threads: Option<usize>,
}

impl Default for HostDeviceOpts {
    fn default() -> Self {
        Self {
            devices: 1,
            threads: None,
        }
    }
}

/// Settings of a [`crate::ComputeContext`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextSettings {
    /// Backend to enumerate devices from.
    pub backend: BackendKind,
    /// Index of the device requests execute on. Programs are built on every device.
    pub device: usize,
    /// Check expressions against the restricted grammar before any device build.
    pub validate_expressions: bool,
    /// Host device options, used when `backend` is `host`.
    pub host: HostDeviceOpts,
}

impl ContextSettings {
    /// Parse settings from a JSON reader. Missing fields take their defaults.
    pub fn from_reader<R: std::io::Read>(r: R) -> MeshResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| MeshError::serde(format!("parse settings JSON: {e}")))
    }

    /// Parse settings from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            MeshError::validation(format!("open settings JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
