//! Kubernetes resource watchers.
//!
//! Reconciled resources run through `kube_runtime::Controller`, which
//! serialises work per object, reconnects on watch errors and applies the
//! requeue decisions of the [`Reconciler`]. Template caches are filled by
//! reflectors running as background tasks.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::{REVISION_UPGRADE, Reconciler, VIRTUAL_MACHINE, requeue_key};
use crds::{ControllerRevisionUpgrade, VirtualMachine};
use futures::StreamExt;
use kube::{Api, Resource, ResourceExt};
use kube_runtime::reflector::{self, Store};
use kube_runtime::{Controller, WatchStreamExt, controller::{Action, Config as KubeControllerConfig}, watcher};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, ControllerError>> + Send>>;

/// Generic watcher helper around `kube_runtime::Controller`.
///
/// Runs until a shutdown signal is received. Failed reconciliations are
/// handed to [`Reconciler::error_action`], keyed by `resource_name` and the
/// object's namespace and name.
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &'static str,
    config: &ControllerConfig,
) -> Result<(), ControllerError>
where
    K: Resource + Clone + Send + Sync + 'static + Debug + DeserializeOwned,
    K::DynamicType: Default + Eq + Hash + Clone + Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let key = requeue_key(resource_name, obj.namespace().as_deref(), &obj.name_any());
        ctx.error_action(&key, error)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!("Reconciling {} {}/{}", resource_name, obj.namespace().unwrap_or_default(), obj.name_any());
            reconcile_fn(ctx, obj).await
        }
    };

    let controller_config = KubeControllerConfig::default()
        .debounce(config.debounce)
        .concurrency(config.worker_concurrency);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    info!("{} watcher stopped", resource_name);
    Ok(())
}

/// Mirrors the objects of `api` into a local store from a background task.
///
/// The task only ends when the watch stream does, which is reported as a
/// [`ControllerError::Watch`].
pub fn spawn_reflector<K>(
    api: Api<K>,
    watcher_config: watcher::Config,
    resource_name: &'static str,
) -> (Store<K>, JoinHandle<Result<(), ControllerError>>)
where
    K: Resource + Clone + Send + Sync + 'static + Debug + DeserializeOwned,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    let (reader, writer) = reflector::store();
    let handle = tokio::spawn(async move {
        info!("Starting {} reflector", resource_name);
        reflector::reflector(writer, watcher(api, watcher_config))
            .default_backoff()
            .for_each(|event| async move {
                if let Err(e) = event {
                    warn!("{} watch error: {}", resource_name, e);
                }
            })
            .await;
        Err(ControllerError::Watch(format!("{resource_name} reflector stopped")))
    });
    (reader, handle)
}

/// Watches the resources reconciled by the controller.
#[derive(Debug)]
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    config: ControllerConfig,
    virtual_machine_api: Api<VirtualMachine>,
    revision_upgrade_api: Api<ControllerRevisionUpgrade>,
}

impl Watcher {
    /// Creates watchers sharing one reconciler.
    pub fn new(
        reconciler: Arc<Reconciler>,
        config: ControllerConfig,
        virtual_machine_api: Api<VirtualMachine>,
        revision_upgrade_api: Api<ControllerRevisionUpgrade>,
    ) -> Self {
        Self {
            reconciler,
            config,
            virtual_machine_api,
            revision_upgrade_api,
        }
    }

    /// Freezes and pins the templates of every virtual machine.
    pub async fn watch_virtual_machines(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.virtual_machine_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler: Arc<Reconciler>, vm: Arc<VirtualMachine>| -> ReconcileFuture {
                Box::pin(async move { reconciler.reconcile_virtual_machine(&vm).await })
            },
            VIRTUAL_MACHINE,
            &self.config,
        )
        .await
    }

    /// Serves revision upgrade requests.
    pub async fn watch_revision_upgrades(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.revision_upgrade_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler: Arc<Reconciler>, upgrade: Arc<ControllerRevisionUpgrade>| -> ReconcileFuture {
                Box::pin(async move { reconciler.reconcile_upgrade(&upgrade).await })
            },
            REVISION_UPGRADE,
            &self.config,
        )
        .await
    }
}
