//! Object store client errors

use thiserror::Error;

/// Errors that can occur when talking to the object store
#[derive(Debug, Error)]
pub enum ClientError {
    /// The requested object does not exist
    #[error("{kind} {name:?} not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Name (qualified with the namespace when namespaced)
        name: String,
    },

    /// Creation failed because an object with the same name exists
    #[error("{kind} {name:?} already exists")]
    AlreadyExists {
        /// Kind of the object
        kind: String,
        /// Name of the object
        name: String,
    },

    /// A conditional write lost a race (failed patch test or stale resource version)
    #[error("conflicting write to {kind} {name:?}: {message}")]
    Conflict {
        /// Kind of the object
        kind: String,
        /// Name of the object
        name: String,
        /// Message of the API server
        message: String,
    },

    /// Any other Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request rejected before reaching the API server
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Builds a [`ClientError::NotFound`] for a namespaced or cluster object.
    pub fn not_found(kind: &str, namespace: Option<&str>, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: qualified_name(namespace, name),
        }
    }

    /// Whether this error reports a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error reports an existing object on create.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Whether this error reports a lost optimistic-concurrency race.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// `namespace/name` for namespaced objects, `name` otherwise.
pub(crate) fn qualified_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) => format!("{namespace}/{name}"),
        None => name.to_string(),
    }
}
