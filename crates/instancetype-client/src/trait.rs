//! InstancetypeClient trait for mocking
//!
//! The controller core only talks to the object store through this trait.
//! The kube-backed client implements it, and tests swap in the in-memory mock.

use crate::error::ClientError;
use crate::patch::PatchOperation;
use crds::{
    ControllerRevisionUpgrade, ControllerRevisionUpgradeStatus, VirtualMachine,
    VirtualMachineClusterInstancetype, VirtualMachineClusterPreference, VirtualMachineInstancetype,
    VirtualMachinePreference,
};
use k8s_openapi::api::apps::v1::ControllerRevision;

/// Trait for object store operations
///
/// Lookups of missing objects fail with [`ClientError::NotFound`], creation
/// of existing objects with [`ClientError::AlreadyExists`] and failed
/// conditional writes with [`ClientError::Conflict`].
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait InstancetypeClientTrait: Send + Sync {
    // Templates
    async fn get_instancetype(&self, namespace: &str, name: &str) -> Result<VirtualMachineInstancetype, ClientError>;
    async fn get_cluster_instancetype(&self, name: &str) -> Result<VirtualMachineClusterInstancetype, ClientError>;
    async fn get_preference(&self, namespace: &str, name: &str) -> Result<VirtualMachinePreference, ClientError>;
    async fn get_cluster_preference(&self, name: &str) -> Result<VirtualMachineClusterPreference, ClientError>;

    // Virtual machines
    async fn get_virtual_machine(&self, namespace: &str, name: &str) -> Result<VirtualMachine, ClientError>;

    /// Applies an RFC 6902 patch; a failed `test` surfaces as [`ClientError::Conflict`].
    async fn patch_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
        operations: &[PatchOperation],
    ) -> Result<VirtualMachine, ClientError>;

    // Controller revisions
    async fn get_controller_revision(&self, namespace: &str, name: &str) -> Result<ControllerRevision, ClientError>;
    async fn create_controller_revision(
        &self,
        namespace: &str,
        revision: &ControllerRevision,
    ) -> Result<ControllerRevision, ClientError>;
    async fn delete_controller_revision(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    // Revision upgrades
    async fn get_revision_upgrade(&self, namespace: &str, name: &str) -> Result<ControllerRevisionUpgrade, ClientError>;
    async fn update_revision_upgrade_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ControllerRevisionUpgradeStatus,
    ) -> Result<ControllerRevisionUpgrade, ClientError>;
}
