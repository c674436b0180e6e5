//! Upgrade Reconciler
//!
//! Drives `ControllerRevisionUpgrade` requests through
//! `Unset -> InProgress -> Succeeded | Failed`. The claim is persisted before
//! any migration work, terminal phases are never left again.

mod upgrader;

pub use upgrader::{RevisionUpgrader, SchemaUpgrader};

use crate::error::InstancetypeError;
use chrono::Utc;
use crds::{ControllerRevisionUpgrade, ControllerRevisionUpgradeStatus, UpgradePhase};
use instancetype_client::InstancetypeClientTrait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reconciles revision upgrade requests.
#[derive(Clone)]
pub struct UpgradeReconciler {
    client: Arc<dyn InstancetypeClientTrait>,
    upgrader: Arc<dyn RevisionUpgrader>,
}

impl std::fmt::Debug for UpgradeReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeReconciler").finish_non_exhaustive()
    }
}

impl UpgradeReconciler {
    pub fn new(client: Arc<dyn InstancetypeClientTrait>, upgrader: Arc<dyn RevisionUpgrader>) -> Self {
        Self { client, upgrader }
    }

    /// Advances the request `namespace/name` by one step.
    ///
    /// Returns whether the request should be queued again with backoff. A
    /// missing request is reported as not found.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<bool, InstancetypeError> {
        let upgrade = self.client.get_revision_upgrade(namespace, name).await?;

        match upgrade.phase() {
            UpgradePhase::Succeeded | UpgradePhase::Failed => {
                debug!("ControllerRevisionUpgrade {}/{} already finished", namespace, name);
                Ok(false)
            }
            UpgradePhase::Unset => {
                info!("Claiming ControllerRevisionUpgrade {}/{}", namespace, name);
                self.set_status(namespace, name, &upgrade, UpgradePhase::InProgress, None, None)
                    .await?;
                Ok(false)
            }
            UpgradePhase::InProgress => self.migrate(namespace, name, &upgrade).await,
        }
    }

    async fn migrate(
        &self,
        namespace: &str,
        name: &str,
        upgrade: &ControllerRevisionUpgrade,
    ) -> Result<bool, InstancetypeError> {
        let target = &upgrade.spec.target_name;
        let revision = match self.client.get_controller_revision(namespace, target).await {
            Ok(revision) => revision,
            Err(err) if err.is_not_found() => {
                warn!("ControllerRevisionUpgrade {}/{}: target {} not found", namespace, name, target);
                self.set_status(namespace, name, upgrade, UpgradePhase::Failed, None, Some(err.to_string()))
                    .await?;
                return Ok(true);
            }
            Err(err) => return Err(err.into()),
        };

        match self.upgrader.upgrade(&revision).await {
            Ok(upgraded) => {
                let result = upgraded.metadata.name.clone();
                info!(
                    "ControllerRevisionUpgrade {}/{} succeeded: {} -> {}",
                    namespace,
                    name,
                    target,
                    result.as_deref().unwrap_or_default()
                );
                self.set_status(namespace, name, upgrade, UpgradePhase::Succeeded, result, None)
                    .await?;
                Ok(false)
            }
            Err(err) => {
                warn!("ControllerRevisionUpgrade {}/{} failed: {}", namespace, name, err);
                self.set_status(namespace, name, upgrade, UpgradePhase::Failed, None, Some(err.to_string()))
                    .await?;
                Ok(true)
            }
        }
    }

    async fn set_status(
        &self,
        namespace: &str,
        name: &str,
        upgrade: &ControllerRevisionUpgrade,
        phase: UpgradePhase,
        result: Option<String>,
        message: Option<String>,
    ) -> Result<(), InstancetypeError> {
        let current = upgrade.status.clone().unwrap_or_default();
        let status = ControllerRevisionUpgradeStatus {
            phase: Some(phase),
            result: result.or(current.result),
            message,
            last_transition_time: Some(Utc::now()),
        };
        self.client.update_revision_upgrade_status(namespace, name, &status).await?;
        Ok(())
    }
}

#[cfg(test)]
mod upgrade_test;
