//! Error types for instance type handling

use crate::apply::conflicts::Conflicts;
use crds::UnknownKindError;
use instancetype_client::ClientError;
use thiserror::Error;

/// Errors raised while resolving, applying, storing or upgrading templates
#[derive(Debug, Error)]
pub enum InstancetypeError {
    /// Object store failure, including not-found, surfaced unchanged
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The virtual machine already sets fields the instance type claims
    #[error("VM conflicts with instancetype spec in fields: [{0}]")]
    Conflicts(Conflicts),

    /// A matcher names a kind outside its template family
    #[error(transparent)]
    UnknownKind(#[from] UnknownKindError),

    /// A stored revision could not be decoded into a template
    #[error("failed to decode ControllerRevision {name}: {reason}")]
    Decode {
        /// Name of the revision
        name: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// A deterministic revision name is already taken by different content
    #[error("found existing ControllerRevision with unexpected data: {0}")]
    RevisionMismatch(String),

    /// A template could not be encoded into a revision payload
    #[error("failed to encode revision payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// An object is missing data required to process it
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// Migrating a revision to the latest schema failed
    #[error("failed to upgrade ControllerRevision {name}: {reason}")]
    Upgrade {
        /// Name of the revision
        name: String,
        /// Why the migration failed
        reason: String,
    },
}

impl InstancetypeError {
    /// Whether retrying the same operation later can succeed.
    ///
    /// Consistency violations, unknown kinds and undecodable or malformed
    /// objects cannot resolve themselves and are not retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Client(_) | Self::Conflicts(_) | Self::Upgrade { .. } => true,
            Self::UnknownKind(_)
            | Self::Decode { .. }
            | Self::Encode(_)
            | Self::RevisionMismatch(_)
            | Self::InvalidObject(_) => false,
        }
    }

    /// Whether this error reports a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Client(error) if error.is_not_found())
    }

    pub(crate) fn decode(name: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::conflicts::FieldPath;

    #[test]
    fn test_conflict_message_lists_every_path() {
        let root = FieldPath::new("spec").child("template").child("spec");
        let conflicts: Conflicts = vec![
            root.child("domain").child("cpu").child("cores"),
            root.child("domain").child("memory"),
        ]
        .into();
        let error = InstancetypeError::Conflicts(conflicts);
        assert_eq!(
            error.to_string(),
            "VM conflicts with instancetype spec in fields: [spec.template.spec.domain.cpu.cores, spec.template.spec.domain.memory]"
        );
        assert!(error.is_retryable());
    }

    #[test]
    fn test_consistency_violations_are_not_retryable() {
        assert!(!InstancetypeError::RevisionMismatch("rev".to_string()).is_retryable());
        assert!(!InstancetypeError::decode("rev", "unexpected kind").is_retryable());
    }

    #[test]
    fn test_not_found_is_detected_through_client_errors() {
        let error = InstancetypeError::from(ClientError::not_found("ControllerRevision", Some("ns"), "rev"));
        assert!(error.is_not_found());
        assert!(error.is_retryable());
    }
}
