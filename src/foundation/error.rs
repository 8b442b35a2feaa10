use crate::{build::BuildFailure, device::DeviceError, pipeline::Stage};

/// Convenience alias used across the crate.
pub type MeshResult<T> = Result<T, MeshError>;

/// Top-level error type for surface generation.
#[derive(thiserror::Error, Debug)]
pub enum MeshError {
    /// The request or a domain descriptor is malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// An expression was rejected by the structural check before any device build.
    #[error("expression error: {0}")]
    Expression(String),

    /// One or more devices failed to compile a program.
    #[error(transparent)]
    Build(#[from] BuildFailure),

    /// A device rejected an allocation, transfer or launch.
    #[error("device operation failed: {0}")]
    Device(#[from] DeviceError),

    /// The request was cancelled before `stage` could start.
    #[error("request cancelled before {stage}")]
    Cancelled {
        /// First stage that did not run.
        stage: Stage,
    },

    /// A JSON payload could not be read or written.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Catch-all for errors from outside the crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MeshError {
    /// Build a [`MeshError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MeshError::Expression`] value.
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    /// Build a [`MeshError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// The aggregated build failure, if this error is one.
    pub fn as_build_failure(&self) -> Option<&BuildFailure> {
        match self {
            Self::Build(failure) => Some(failure),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
