//! Mock InstancetypeClient for unit testing
//!
//! This module provides an in-memory implementation of
//! [`InstancetypeClientTrait`] and an in-memory [`ObjectCache`], so the
//! controller core can be tested without an API server.

use crate::cache::ObjectCache;
use crate::error::{ClientError, qualified_name};
use crate::instancetype_trait::InstancetypeClientTrait;
use crate::patch::{PatchOperation, to_json_patch};
use crds::{
    ControllerRevisionUpgrade, ControllerRevisionUpgradeStatus, VirtualMachine,
    VirtualMachineClusterInstancetype, VirtualMachineClusterPreference, VirtualMachineInstancetype,
    VirtualMachinePreference,
};
use k8s_openapi::api::apps::v1::ControllerRevision;
use kube::ResourceExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Key = (String, String);

/// Write performed against the mock, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedAction {
    /// `create_controller_revision`
    CreateRevision { namespace: String, name: String },
    /// `delete_controller_revision`
    DeleteRevision { namespace: String, name: String },
    /// `patch_virtual_machine`
    PatchVirtualMachine {
        namespace: String,
        name: String,
        operations: Vec<PatchOperation>,
    },
    /// `update_revision_upgrade_status`
    UpdateUpgradeStatus {
        namespace: String,
        name: String,
        status: ControllerRevisionUpgradeStatus,
    },
}

/// Mock InstancetypeClient for testing
///
/// Stores objects in memory and records every write, so tests can assert
/// both on resulting state and on the absence of writes.
#[derive(Clone, Default)]
pub struct MockInstancetypeClient {
    instancetypes: Arc<Mutex<HashMap<Key, VirtualMachineInstancetype>>>,
    cluster_instancetypes: Arc<Mutex<HashMap<String, VirtualMachineClusterInstancetype>>>,
    preferences: Arc<Mutex<HashMap<Key, VirtualMachinePreference>>>,
    cluster_preferences: Arc<Mutex<HashMap<String, VirtualMachineClusterPreference>>>,
    virtual_machines: Arc<Mutex<HashMap<Key, VirtualMachine>>>,
    revisions: Arc<Mutex<HashMap<Key, ControllerRevision>>>,
    upgrades: Arc<Mutex<HashMap<Key, ControllerRevisionUpgrade>>>,
    actions: Arc<Mutex<Vec<RecordedAction>>>,
}

impl std::fmt::Debug for MockInstancetypeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockInstancetypeClient")
            .field("actions", &self.actions.lock().unwrap().len())
            .finish_non_exhaustive()
    }
}

fn key_of<K: ResourceExt>(object: &K) -> Key {
    (object.namespace().unwrap_or_default(), object.name_any())
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

impl MockInstancetypeClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespaced instance type (for test setup)
    pub fn add_instancetype(&self, instancetype: VirtualMachineInstancetype) {
        self.instancetypes.lock().unwrap().insert(key_of(&instancetype), instancetype);
    }

    /// Add a cluster instance type (for test setup)
    pub fn add_cluster_instancetype(&self, instancetype: VirtualMachineClusterInstancetype) {
        self.cluster_instancetypes
            .lock()
            .unwrap()
            .insert(instancetype.name_any(), instancetype);
    }

    /// Add a namespaced preference (for test setup)
    pub fn add_preference(&self, preference: VirtualMachinePreference) {
        self.preferences.lock().unwrap().insert(key_of(&preference), preference);
    }

    /// Add a cluster preference (for test setup)
    pub fn add_cluster_preference(&self, preference: VirtualMachineClusterPreference) {
        self.cluster_preferences
            .lock()
            .unwrap()
            .insert(preference.name_any(), preference);
    }

    /// Add a virtual machine (for test setup)
    pub fn add_virtual_machine(&self, vm: VirtualMachine) {
        self.virtual_machines.lock().unwrap().insert(key_of(&vm), vm);
    }

    /// Add a controller revision without recording a write (for test setup)
    pub fn add_controller_revision(&self, revision: ControllerRevision) {
        self.revisions.lock().unwrap().insert(key_of(&revision), revision);
    }

    /// Add a revision upgrade request (for test setup)
    pub fn add_revision_upgrade(&self, upgrade: ControllerRevisionUpgrade) {
        self.upgrades.lock().unwrap().insert(key_of(&upgrade), upgrade);
    }

    /// Current state of a virtual machine
    pub fn virtual_machine(&self, namespace: &str, name: &str) -> Option<VirtualMachine> {
        self.virtual_machines.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Current state of a controller revision
    pub fn controller_revision(&self, namespace: &str, name: &str) -> Option<ControllerRevision> {
        self.revisions.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Names of all stored controller revisions, sorted
    pub fn controller_revision_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.revisions.lock().unwrap().keys().map(|(_, name)| name.clone()).collect();
        names.sort();
        names
    }

    /// Current state of a revision upgrade request
    pub fn revision_upgrade(&self, namespace: &str, name: &str) -> Option<ControllerRevisionUpgrade> {
        self.upgrades.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Writes recorded so far
    pub fn actions(&self) -> Vec<RecordedAction> {
        self.actions.lock().unwrap().clone()
    }

    /// Forget recorded writes (state is kept)
    pub fn clear_actions(&self) {
        self.actions.lock().unwrap().clear();
    }

    fn record(&self, action: RecordedAction) {
        self.actions.lock().unwrap().push(action);
    }
}

/// Applies operations with API server semantics: a `test` against `null`
/// succeeds when the path does not exist.
fn apply_operations(document: &mut serde_json::Value, operations: &[PatchOperation]) -> Result<(), String> {
    for operation in operations {
        match operation {
            PatchOperation::Test { path, value } => {
                let current = document.pointer(path).unwrap_or(&serde_json::Value::Null);
                if current != value {
                    return Err(format!("test failed at {path}: expected {value}, found {current}"));
                }
            }
            other => {
                let patch = to_json_patch(std::slice::from_ref(other)).map_err(|e| e.to_string())?;
                json_patch::patch(document, &patch.0).map_err(|e| e.to_string())?;
            }
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl InstancetypeClientTrait for MockInstancetypeClient {
    async fn get_instancetype(&self, namespace: &str, name: &str) -> Result<VirtualMachineInstancetype, ClientError> {
        self.instancetypes
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClientError::not_found("VirtualMachineInstancetype", Some(namespace), name))
    }

    async fn get_cluster_instancetype(&self, name: &str) -> Result<VirtualMachineClusterInstancetype, ClientError> {
        self.cluster_instancetypes
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::not_found("VirtualMachineClusterInstancetype", None, name))
    }

    async fn get_preference(&self, namespace: &str, name: &str) -> Result<VirtualMachinePreference, ClientError> {
        self.preferences
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClientError::not_found("VirtualMachinePreference", Some(namespace), name))
    }

    async fn get_cluster_preference(&self, name: &str) -> Result<VirtualMachineClusterPreference, ClientError> {
        self.cluster_preferences
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::not_found("VirtualMachineClusterPreference", None, name))
    }

    async fn get_virtual_machine(&self, namespace: &str, name: &str) -> Result<VirtualMachine, ClientError> {
        self.virtual_machine(namespace, name)
            .ok_or_else(|| ClientError::not_found("VirtualMachine", Some(namespace), name))
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
        self.record(RecordedAction::PatchVirtualMachine {
            namespace: namespace.to_string(),
            name: name.to_string(),
            operations: operations.to_vec(),
        });

        let mut vms = self.virtual_machines.lock().unwrap();
        let vm = vms
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClientError::not_found("VirtualMachine", Some(namespace), name))?;
        let mut document = serde_json::to_value(&*vm)?;
        apply_operations(&mut document, operations).map_err(|message| ClientError::Conflict {
            kind: "VirtualMachine".to_string(),
            name: qualified_name(Some(namespace), name),
            message,
        })?;
        *vm = serde_json::from_value(document)?;
        Ok(vm.clone())
    }

    async fn get_controller_revision(&self, namespace: &str, name: &str) -> Result<ControllerRevision, ClientError> {
        self.controller_revision(namespace, name)
            .ok_or_else(|| ClientError::not_found("ControllerRevision", Some(namespace), name))
    }

    async fn create_controller_revision(
        &self,
        namespace: &str,
        revision: &ControllerRevision,
    ) -> Result<ControllerRevision, ClientError> {
        let name = revision.name_any();
        self.record(RecordedAction::CreateRevision {
            namespace: namespace.to_string(),
            name: name.clone(),
        });

        let mut revisions = self.revisions.lock().unwrap();
        if revisions.contains_key(&key(namespace, &name)) {
            return Err(ClientError::AlreadyExists {
                kind: "ControllerRevision".to_string(),
                name: qualified_name(Some(namespace), &name),
            });
        }
        let mut created = revision.clone();
        created.metadata.namespace = Some(namespace.to_string());
        created.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        revisions.insert(key(namespace, &name), created.clone());
        Ok(created)
    }

    async fn delete_controller_revision(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        self.record(RecordedAction::DeleteRevision {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.revisions
            .lock()
            .unwrap()
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found("ControllerRevision", Some(namespace), name))
    }

    async fn get_revision_upgrade(&self, namespace: &str, name: &str) -> Result<ControllerRevisionUpgrade, ClientError> {
        self.revision_upgrade(namespace, name)
            .ok_or_else(|| ClientError::not_found("ControllerRevisionUpgrade", Some(namespace), name))
    }

    async fn update_revision_upgrade_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ControllerRevisionUpgradeStatus,
    ) -> Result<ControllerRevisionUpgrade, ClientError> {
        self.record(RecordedAction::UpdateUpgradeStatus {
            namespace: namespace.to_string(),
            name: name.to_string(),
            status: status.clone(),
        });
        let mut upgrades = self.upgrades.lock().unwrap();
        let upgrade = upgrades
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClientError::not_found("ControllerRevisionUpgrade", Some(namespace), name))?;
        upgrade.status = Some(status.clone());
        Ok(upgrade.clone())
    }
}

/// In-memory [`ObjectCache`] for testing
#[derive(Clone)]
pub struct MockCache<K> {
    objects: Arc<Mutex<HashMap<(Option<String>, String), K>>>,
}

impl<K> Default for MockCache<K> {
    fn default() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K> std::fmt::Debug for MockCache<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCache")
            .field("len", &self.objects.lock().unwrap().len())
            .finish()
    }
}

impl<K: ResourceExt + Clone> MockCache<K> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object, keyed by its namespace and name
    pub fn insert(&self, object: K) {
        let key = (object.namespace(), object.name_any());
        self.objects.lock().unwrap().insert(key, object);
    }

    /// Drop an object from the cache
    pub fn remove(&self, namespace: Option<&str>, name: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(namespace.map(str::to_string), name.to_string()));
    }
}

impl<K: Clone + Send> ObjectCache<K> for MockCache<K> {
    fn get_cached(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.map(str::to_string), name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{InstancetypeMatcher, VirtualMachineSpec};
    use serde_json::json;

    fn vm() -> VirtualMachine {
        let mut vm = VirtualMachine::new(
            "db",
            VirtualMachineSpec {
                instancetype: Some(InstancetypeMatcher {
                    name: "small".to_string(),
                    ..InstancetypeMatcher::default()
                }),
                ..VirtualMachineSpec::default()
            },
        );
        vm.metadata.namespace = Some("prod".to_string());
        vm
    }

    #[tokio::test]
    async fn test_patch_test_null_matches_missing_field() {
        let client = MockInstancetypeClient::new();
        client.add_virtual_machine(vm());

        let operations = vec![
            PatchOperation::Test {
                path: "/spec/instancetype/revisionName".to_string(),
                value: serde_json::Value::Null,
            },
            PatchOperation::Add {
                path: "/spec/instancetype/revisionName".to_string(),
                value: json!("db-small-v1beta1-uid-1"),
            },
        ];
        let patched = client.patch_virtual_machine("prod", "db", &operations).await.unwrap();
        assert_eq!(
            patched.spec.instancetype.unwrap().revision_name.as_deref(),
            Some("db-small-v1beta1-uid-1")
        );

        // A second writer loses the race
        let error = client.patch_virtual_machine("prod", "db", &operations).await.unwrap_err();
        assert!(error.is_conflict());
    }

    #[tokio::test]
    async fn test_create_revision_twice_reports_already_exists() {
        let client = MockInstancetypeClient::new();
        let mut revision = ControllerRevision::default();
        revision.metadata.name = Some("rev".to_string());

        client.create_controller_revision("prod", &revision).await.unwrap();
        let error = client.create_controller_revision("prod", &revision).await.unwrap_err();
        assert!(error.is_already_exists());
        assert_eq!(client.actions().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_objects_are_not_found() {
        let client = MockInstancetypeClient::new();
        let error = client.get_cluster_instancetype("missing").await.unwrap_err();
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "VirtualMachineClusterInstancetype \"missing\" not found");
    }

    #[test]
    fn test_mock_cache_is_scoped_by_namespace() {
        let cache = MockCache::new();
        cache.insert(vm());
        assert!(cache.get_cached(Some("prod"), "db").is_some());
        assert!(cache.get_cached(Some("dev"), "db").is_none());
        assert!(cache.get_cached(None, "db").is_none());
    }
}
