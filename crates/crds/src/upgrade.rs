//! ControllerRevisionUpgrade CRD
//!
//! Requests migration of a stored revision to the latest schema version.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "ControllerRevisionUpgrade",
    namespaced,
    status = "ControllerRevisionUpgradeStatus",
    printcolumn = r#"{"name":"Target","type":"string","jsonPath":".spec.targetName"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRevisionUpgradeSpec {
    /// Name of the `ControllerRevision` to migrate
    pub target_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRevisionUpgradeStatus {
    /// Lifecycle phase (absent until first observed by the controller)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<UpgradePhase>,

    /// Name of the revision holding the migrated payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Reason of the last failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last phase transition timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Upgrade lifecycle phase
///
/// `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
pub enum UpgradePhase {
    /// Not yet observed by the controller
    #[default]
    Unset,
    /// Claimed by the controller, migration not finished
    InProgress,
    /// Migration finished
    Succeeded,
    /// Migration failed
    Failed,
}

impl UpgradePhase {
    /// Whether no further transitions happen from this phase.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl ControllerRevisionUpgrade {
    /// Current phase, treating a missing status as [`UpgradePhase::Unset`].
    #[must_use]
    pub fn phase(&self) -> UpgradePhase {
        self.status
            .as_ref()
            .and_then(|status| status.phase)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_status_is_unset() {
        let upgrade = ControllerRevisionUpgrade::new(
            "upgrade",
            ControllerRevisionUpgradeSpec {
                target_name: "vm-it-v1alpha1-uid-1".to_string(),
            },
        );
        assert_eq!(upgrade.phase(), UpgradePhase::Unset);
        assert!(!upgrade.phase().is_terminal());
    }

    #[test]
    fn test_phase_wire_format() {
        let status: ControllerRevisionUpgradeStatus =
            serde_json::from_value(serde_json::json!({ "phase": "InProgress" })).unwrap();
        assert_eq!(status.phase, Some(UpgradePhase::InProgress));
        assert!(UpgradePhase::Failed.is_terminal());
        assert!(UpgradePhase::Succeeded.is_terminal());
    }
}
