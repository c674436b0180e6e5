use crate::compatibility::{DecodedRevision, decode, stored_version};
use crate::error::InstancetypeError;
use crate::revision::{RevisionStore, repin_operations};
use crds::{LATEST_VERSION, TemplateFamily, TemplateMatcher, VIRTUAL_MACHINE_GROUP};
use instancetype_client::InstancetypeClientTrait;
use k8s_openapi::api::apps::v1::ControllerRevision;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Migration of one stored revision.
#[async_trait::async_trait]
pub trait RevisionUpgrader: Send + Sync {
    /// Migrates `revision` and returns the revision now holding its payload.
    async fn upgrade(&self, revision: &ControllerRevision) -> Result<ControllerRevision, InstancetypeError>;
}

/// Re-encodes revisions at the latest schema version.
///
/// The payload is stored under a new deterministic name, the owning virtual
/// machine is moved over to it and the stale revision is deleted.
#[derive(Clone)]
pub struct SchemaUpgrader {
    client: Arc<dyn InstancetypeClientTrait>,
    store: RevisionStore,
}

impl std::fmt::Debug for SchemaUpgrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaUpgrader").finish_non_exhaustive()
    }
}

impl SchemaUpgrader {
    pub fn new(client: Arc<dyn InstancetypeClientTrait>) -> Self {
        Self {
            store: RevisionStore::new(client.clone()),
            client,
        }
    }
}

#[async_trait::async_trait]
impl RevisionUpgrader for SchemaUpgrader {
    async fn upgrade(&self, revision: &ControllerRevision) -> Result<ControllerRevision, InstancetypeError> {
        let name = revision.name_any();
        let upgrade_error = |reason: &str| InstancetypeError::Upgrade {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if stored_version(revision)? == LATEST_VERSION {
            debug!("ControllerRevision {} already at {}", name, LATEST_VERSION);
            return Ok(revision.clone());
        }

        let namespace = revision
            .namespace()
            .ok_or_else(|| upgrade_error("revision has no namespace"))?;
        let owner = revision
            .owner_references()
            .iter()
            .find(|owner| {
                owner.controller == Some(true)
                    && owner.kind == "VirtualMachine"
                    && owner.api_version.starts_with(VIRTUAL_MACHINE_GROUP)
            })
            .ok_or_else(|| upgrade_error("revision is not owned by a VirtualMachine"))?;
        let vm = self.client.get_virtual_machine(&namespace, &owner.name).await?;

        let decoded = decode(revision, None)?;
        let upgraded = match &decoded {
            DecodedRevision::Instancetype(template) => self.store.store_once(&vm, template).await?,
            DecodedRevision::Preference(template) => self.store.store_once(&vm, template).await?,
        };
        let upgraded_name = upgraded.name_any();
        if upgraded_name == name {
            return Err(upgrade_error("migrated revision would replace itself"));
        }

        let family = decoded.family();
        let pinned = match family {
            TemplateFamily::Instancetype => vm.spec.instancetype.as_ref().and_then(|m| m.revision_name()),
            TemplateFamily::Preference => vm.spec.preference.as_ref().and_then(|m| m.revision_name()),
        };
        if pinned == Some(name.as_str()) {
            self.client
                .patch_virtual_machine(&namespace, &vm.name_any(), &repin_operations(family, &name, &upgraded_name))
                .await?;
        } else {
            warn!(
                "VirtualMachine {}/{} does not reference ControllerRevision {}, not repinning",
                namespace,
                vm.name_any(),
                name
            );
        }

        match self.client.delete_controller_revision(&namespace, &name).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        info!(
            "Upgraded ControllerRevision {}/{} to {} as {}",
            namespace, name, LATEST_VERSION, upgraded_name
        );
        Ok(upgraded)
    }
}
