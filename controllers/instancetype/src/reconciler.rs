//! Reconciliation logic.
//!
//! Shared context of both watchers. Success forgets the failure history of
//! an object; retryable failures are requeued with per-object exponential
//! backoff until the retry budget is used up.

use crate::backoff::RequeueLimiter;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crds::{ControllerRevisionUpgrade, VirtualMachine};
use instancetype::{
    InstancetypeError, InstancetypeHandler, RevisionStore, SchemaUpgrader, TemplateCaches, TemplateResolver,
    UpgradeReconciler,
};
use instancetype_client::InstancetypeClientTrait;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Resource name of virtual machines in requeue keys and logs
pub const VIRTUAL_MACHINE: &str = "VirtualMachine";
/// Resource name of revision upgrade requests in requeue keys and logs
pub const REVISION_UPGRADE: &str = "ControllerRevisionUpgrade";

/// Key identifying one object in the requeue limiter.
#[must_use]
pub fn requeue_key(resource_name: &str, namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}/{}", resource_name, namespace.unwrap_or_default(), name)
}

/// Reconciles virtual machines and revision upgrade requests.
#[derive(Debug)]
pub struct Reconciler {
    handler: InstancetypeHandler,
    upgrades: UpgradeReconciler,
    limiter: RequeueLimiter,
}

impl Reconciler {
    /// Creates a reconciler reading templates through `caches` first.
    pub fn new(
        client: Arc<dyn InstancetypeClientTrait>,
        caches: TemplateCaches,
        config: &ControllerConfig,
    ) -> Self {
        let resolver = TemplateResolver::new(Arc::clone(&client), caches);
        let store = RevisionStore::new(Arc::clone(&client));
        let upgrader = Arc::new(SchemaUpgrader::new(Arc::clone(&client)));
        Self {
            handler: InstancetypeHandler::new(resolver, store),
            upgrades: UpgradeReconciler::new(client, upgrader),
            limiter: RequeueLimiter::new(config.requeue_base, config.requeue_max, config.max_retries),
        }
    }

    /// Freezes and pins the templates of a virtual machine.
    pub async fn reconcile_virtual_machine(&self, vm: &VirtualMachine) -> Result<Action, ControllerError> {
        let namespace = vm.namespace();
        let name = vm.name_any();

        if vm.metadata.deletion_timestamp.is_some() {
            debug!("VirtualMachine {}/{} is being deleted, skipping", namespace.as_deref().unwrap_or_default(), name);
            return Ok(Action::await_change());
        }

        self.handler.apply_to_instance(vm).await?;
        self.limiter.forget(&requeue_key(VIRTUAL_MACHINE, namespace.as_deref(), &name));
        Ok(Action::await_change())
    }

    /// Advances a revision upgrade request by one step.
    pub async fn reconcile_upgrade(&self, upgrade: &ControllerRevisionUpgrade) -> Result<Action, ControllerError> {
        let name = upgrade.name_any();
        let Some(namespace) = upgrade.namespace() else {
            return Err(InstancetypeError::InvalidObject(format!("ControllerRevisionUpgrade {name} has no namespace")).into());
        };

        let key = requeue_key(REVISION_UPGRADE, Some(&namespace), &name);
        if self.upgrades.reconcile(&namespace, &name).await? {
            return Ok(self.rate_limited(&key));
        }
        self.limiter.forget(&key);
        Ok(Action::await_change())
    }

    /// Decides how a failed reconciliation of `key` is retried.
    pub fn error_action(&self, key: &str, error: &ControllerError) -> Action {
        if !error.is_retryable() {
            error!("Reconciliation of {} failed permanently: {}", key, error);
            self.limiter.forget(key);
            return Action::await_change();
        }
        warn!("Reconciliation of {} failed: {}", key, error);
        self.rate_limited(key)
    }

    fn rate_limited(&self, key: &str) -> Action {
        match self.limiter.next_delay(key) {
            Some(delay) => {
                debug!("Requeueing {} in {}s", key, delay.as_secs());
                Action::requeue(delay)
            }
            None => {
                warn!("Giving up on {} until it changes again", key);
                Action::await_change()
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod reconciler_test;
