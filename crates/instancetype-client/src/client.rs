//! kube-backed implementation of [`InstancetypeClientTrait`]

use crate::error::{ClientError, qualified_name};
use crate::instancetype_trait::InstancetypeClientTrait;
use crate::patch::{PatchOperation, to_json_patch};
use crds::{
    ControllerRevisionUpgrade, ControllerRevisionUpgradeStatus, VirtualMachine,
    VirtualMachineClusterInstancetype, VirtualMachineClusterPreference, VirtualMachineInstancetype,
    VirtualMachinePreference,
};
use k8s_openapi::api::apps::v1::ControllerRevision;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Object store client talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeInstancetypeClient {
    client: Client,
}

impl std::fmt::Debug for KubeInstancetypeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeInstancetypeClient").finish_non_exhaustive()
    }
}

impl KubeInstancetypeClient {
    /// Wraps an existing kube client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_namespaced<K>(&self, namespace: &str, name: &str) -> Result<K, ClientError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        debug!("Fetching {} {}/{}", K::kind(&()), namespace, name);
        api.get(name)
            .await
            .map_err(|e| map_api_error(e, &K::kind(&()), Some(namespace), name))
    }

    async fn get_cluster<K>(&self, name: &str) -> Result<K, ClientError>
    where
        K: Resource<Scope = ClusterResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::all(self.client.clone());
        debug!("Fetching {} {}", K::kind(&()), name);
        api.get(name)
            .await
            .map_err(|e| map_api_error(e, &K::kind(&()), None, name))
    }
}

/// Translates API server failures into the error kinds callers branch on.
fn map_api_error(error: kube::Error, kind: &str, namespace: Option<&str>, name: &str) -> ClientError {
    match error {
        kube::Error::Api(response) if response.code == 404 => ClientError::not_found(kind, namespace, name),
        kube::Error::Api(response) if response.code == 409 || response.code == 422 => ClientError::Conflict {
            kind: kind.to_string(),
            name: qualified_name(namespace, name),
            message: response.message.clone(),
        },
        other => ClientError::Kube(other),
    }
}

#[async_trait::async_trait]
impl InstancetypeClientTrait for KubeInstancetypeClient {
    async fn get_instancetype(&self, namespace: &str, name: &str) -> Result<VirtualMachineInstancetype, ClientError> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_cluster_instancetype(&self, name: &str) -> Result<VirtualMachineClusterInstancetype, ClientError> {
        self.get_cluster(name).await
    }

    async fn get_preference(&self, namespace: &str, name: &str) -> Result<VirtualMachinePreference, ClientError> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_cluster_preference(&self, name: &str) -> Result<VirtualMachineClusterPreference, ClientError> {
        self.get_cluster(name).await
    }

    async fn get_virtual_machine(&self, namespace: &str, name: &str) -> Result<VirtualMachine, ClientError> {
        self.get_namespaced(namespace, name).await
    }

    async fn patch_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
        operations: &[PatchOperation],
    ) -> Result<VirtualMachine, ClientError> {
        if operations.is_empty() {
            return Err(ClientError::InvalidRequest(format!(
                "empty patch for VirtualMachine {namespace}/{name}"
            )));
        }
        let api: Api<VirtualMachine> = Api::namespaced(self.client.clone(), namespace);
        let patch = to_json_patch(operations)?;
        debug!("Patching VirtualMachine {}/{} with {} operations", namespace, name, operations.len());
        api.patch(name, &PatchParams::default(), &Patch::Json::<()>(patch))
            .await
            .map_err(|e| map_api_error(e, "VirtualMachine", Some(namespace), name))
    }

    async fn get_controller_revision(&self, namespace: &str, name: &str) -> Result<ControllerRevision, ClientError> {
        self.get_namespaced(namespace, name).await
    }

    async fn create_controller_revision(
        &self,
        namespace: &str,
        revision: &ControllerRevision,
    ) -> Result<ControllerRevision, ClientError> {
        let api: Api<ControllerRevision> = Api::namespaced(self.client.clone(), namespace);
        let name = revision.metadata.name.clone().unwrap_or_default();
        debug!("Creating ControllerRevision {}/{}", namespace, name);
        match api.create(&PostParams::default(), revision).await {
            Ok(created) => Ok(created),
            Err(kube::Error::Api(response)) if response.code == 409 => Err(ClientError::AlreadyExists {
                kind: "ControllerRevision".to_string(),
                name: qualified_name(Some(namespace), &name),
            }),
            Err(e) => Err(map_api_error(e, "ControllerRevision", Some(namespace), &name)),
        }
    }

    async fn delete_controller_revision(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let api: Api<ControllerRevision> = Api::namespaced(self.client.clone(), namespace);
        debug!("Deleting ControllerRevision {}/{}", namespace, name);
        api.delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_api_error(e, "ControllerRevision", Some(namespace), name))
    }

    async fn get_revision_upgrade(&self, namespace: &str, name: &str) -> Result<ControllerRevisionUpgrade, ClientError> {
        self.get_namespaced(namespace, name).await
    }

    async fn update_revision_upgrade_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ControllerRevisionUpgradeStatus,
    ) -> Result<ControllerRevisionUpgrade, ClientError> {
        let api: Api<ControllerRevisionUpgrade> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await
            .map_err(|e| map_api_error(e, "ControllerRevisionUpgrade", Some(namespace), name))
    }
}
