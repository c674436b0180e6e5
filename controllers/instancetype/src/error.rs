//! Controller-specific error types.
//!
//! Errors of the instancetype library are wrapped unchanged so the requeue
//! policy can ask them whether a retry makes sense.

use instancetype::InstancetypeError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the instancetype controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Resolving, applying, storing or upgrading templates failed
    #[error(transparent)]
    Instancetype(#[from] InstancetypeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether the failed reconciliation should be requeued.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Instancetype(error) => error.is_retryable(),
            Self::InvalidConfig(_) => false,
            Self::Kube(_) | Self::Watch(_) => true,
        }
    }
}
