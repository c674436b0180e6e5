//! Main controller implementation.
//!
//! Builds the kube client, starts the template cache reflectors and runs
//! one watcher per reconciled resource until either stops.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::{Watcher, spawn_reflector};
use crds::{
    ControllerRevisionUpgrade, VirtualMachine, VirtualMachineClusterInstancetype, VirtualMachineClusterPreference,
    VirtualMachineInstancetype, VirtualMachinePreference, revision_labels,
};
use instancetype::TemplateCaches;
use instancetype_client::{InstancetypeClientTrait, KubeInstancetypeClient};
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::ControllerRevision;
use kube::{Api, Client, Resource};
use kube_runtime::watcher;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for instance types and preferences.
#[derive(Debug)]
pub struct Controller {
    virtual_machine_watcher: JoinHandle<Result<(), ControllerError>>,
    revision_upgrade_watcher: JoinHandle<Result<(), ControllerError>>,
    reflectors: Vec<JoinHandle<Result<(), ControllerError>>>,
}

/// Api for a namespaced resource, limited to the watched namespace if any.
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Instancetype Controller");

        let mut kube_config = kube::Config::infer()
            .await
            .map_err(|e| ControllerError::InvalidConfig(format!("failed to infer Kubernetes configuration: {e}")))?;
        kube_config.read_timeout = Some(config.request_timeout);
        let kube_client = Client::try_from(kube_config)?;

        let namespace = config.namespace.as_deref();
        let mut reflectors = Vec::new();

        let (instancetypes, handle) = spawn_reflector(
            scoped_api::<VirtualMachineInstancetype>(&kube_client, namespace),
            watcher::Config::default(),
            "VirtualMachineInstancetype",
        );
        reflectors.push(handle);
        let (cluster_instancetypes, handle) = spawn_reflector(
            Api::<VirtualMachineClusterInstancetype>::all(kube_client.clone()),
            watcher::Config::default(),
            "VirtualMachineClusterInstancetype",
        );
        reflectors.push(handle);
        let (preferences, handle) = spawn_reflector(
            scoped_api::<VirtualMachinePreference>(&kube_client, namespace),
            watcher::Config::default(),
            "VirtualMachinePreference",
        );
        reflectors.push(handle);
        let (cluster_preferences, handle) = spawn_reflector(
            Api::<VirtualMachineClusterPreference>::all(kube_client.clone()),
            watcher::Config::default(),
            "VirtualMachineClusterPreference",
        );
        reflectors.push(handle);
        // Only revisions stored by this controller carry the object labels
        let (revisions, handle) = spawn_reflector(
            scoped_api::<ControllerRevision>(&kube_client, namespace),
            watcher::Config::default().labels(revision_labels::OBJECT_KIND),
            "ControllerRevision",
        );
        reflectors.push(handle);

        let caches = TemplateCaches {
            instancetypes: Some(Arc::new(instancetypes)),
            cluster_instancetypes: Some(Arc::new(cluster_instancetypes)),
            preferences: Some(Arc::new(preferences)),
            cluster_preferences: Some(Arc::new(cluster_preferences)),
            revisions: Some(Arc::new(revisions)),
        };

        let client: Arc<dyn InstancetypeClientTrait> = Arc::new(KubeInstancetypeClient::new(kube_client.clone()));
        let reconciler = Arc::new(Reconciler::new(client, caches, &config));

        let watcher = Arc::new(Watcher::new(
            reconciler,
            config.clone(),
            scoped_api::<VirtualMachine>(&kube_client, namespace),
            scoped_api::<ControllerRevisionUpgrade>(&kube_client, namespace),
        ));

        let virtual_machine_watcher = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_virtual_machines().await })
        };
        let revision_upgrade_watcher = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_revision_upgrades().await })
        };

        info!("Instancetype Controller initialized");
        Ok(Self {
            virtual_machine_watcher,
            revision_upgrade_watcher,
            reflectors,
        })
    }

    /// Runs until a watcher stops, either on shutdown or on failure.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Instancetype Controller running");

        let result = tokio::select! {
            result = &mut self.virtual_machine_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("VirtualMachine watcher panicked: {e}")))
                    .and_then(|inner| inner)
            }
            result = &mut self.revision_upgrade_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("ControllerRevisionUpgrade watcher panicked: {e}")))
                    .and_then(|inner| inner)
            }
            (result, _, _) = futures::future::select_all(self.reflectors.iter_mut()) => {
                result.map_err(|e| ControllerError::Watch(format!("reflector panicked: {e}")))
                    .and_then(|inner| inner)
            }
        };

        // Both controllers stop on the same signal; do not leave the other half running
        self.virtual_machine_watcher.abort();
        self.revision_upgrade_watcher.abort();
        for reflector in &self.reflectors {
            reflector.abort();
        }
        result
    }
}
