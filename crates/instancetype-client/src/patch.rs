//! JSON patch operations
//!
//! Only the operations the controller emits are modelled. They are sent to
//! the API server as an RFC 6902 document.

use serde::{Deserialize, Serialize};

/// A single RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Assert the value at `path`; a missing path compares equal to `null`
    Test {
        /// JSON pointer
        path: String,
        /// Expected value
        value: serde_json::Value,
    },
    /// Add or overwrite the value at `path`
    Add {
        /// JSON pointer
        path: String,
        /// New value
        value: serde_json::Value,
    },
    /// Overwrite the existing value at `path`
    Replace {
        /// JSON pointer
        path: String,
        /// New value
        value: serde_json::Value,
    },
    /// Remove the value at `path`
    Remove {
        /// JSON pointer
        path: String,
    },
}

impl PatchOperation {
    /// JSON pointer the operation targets.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Test { path, .. } | Self::Add { path, .. } | Self::Replace { path, .. } | Self::Remove { path } => path,
        }
    }
}

/// Converts operations into the patch document understood by `kube`.
pub fn to_json_patch(operations: &[PatchOperation]) -> Result<json_patch::Patch, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(operations)?)
}
