use super::compare::compare;
use super::patch::pin_operations;
use crate::apply::check_instancetype_conflicts;
use crate::error::InstancetypeError;
use crate::find::vm_namespace;
use crate::template::{InstancetypeTemplate, PreferenceTemplate, Template};
use crds::{LATEST_VERSION, TemplateFamily, TemplateMatcher, VirtualMachine, revision_labels};
use instancetype_client::{InstancetypeClientTrait, PatchOperation};
use k8s_openapi::api::apps::v1::ControllerRevision;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use kube::ResourceExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// `<vm>-<template>-<version>-<uid>-<generation>`
#[must_use]
pub fn revision_name(vm_name: &str, template_name: &str, version: &str, uid: &str, generation: i64) -> String {
    format!("{vm_name}-{template_name}-{version}-{uid}-{generation}")
}

/// Builds the revision freezing `template` for `vm`, at the latest schema.
///
/// The revision is owned by the virtual machine so it is garbage collected
/// along with it.
pub fn build_revision<S: Serialize>(
    vm: &VirtualMachine,
    template: &Template<S>,
) -> Result<ControllerRevision, InstancetypeError> {
    let vm_name = vm.name_any();
    let vm_uid = vm
        .metadata
        .uid
        .clone()
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| InstancetypeError::InvalidObject(format!("VirtualMachine {vm_name} has no uid")))?;

    let labels = BTreeMap::from([
        (revision_labels::OBJECT_GENERATION.to_string(), template.generation().to_string()),
        (revision_labels::OBJECT_KIND.to_string(), template.kind().to_string()),
        (revision_labels::OBJECT_NAME.to_string(), template.name().to_string()),
        (revision_labels::OBJECT_UID.to_string(), template.uid().to_string()),
        (revision_labels::OBJECT_VERSION.to_string(), LATEST_VERSION.to_string()),
    ]);

    Ok(ControllerRevision {
        metadata: ObjectMeta {
            name: Some(revision_name(
                &vm_name,
                template.name(),
                LATEST_VERSION,
                template.uid(),
                template.generation(),
            )),
            namespace: vm.metadata.namespace.clone(),
            labels: Some(labels),
            owner_references: Some(vec![OwnerReference {
                api_version: "kubevirt.io/v1".to_string(),
                kind: "VirtualMachine".to_string(),
                name: vm_name,
                uid: vm_uid,
                controller: Some(true),
                block_owner_deletion: Some(true),
            }]),
            ..ObjectMeta::default()
        },
        data: Some(RawExtension(template.to_payload()?)),
        revision: 0,
    })
}

/// Freezes templates into revisions and pins virtual machines to them.
#[derive(Clone)]
pub struct RevisionStore {
    client: Arc<dyn InstancetypeClientTrait>,
}

impl std::fmt::Debug for RevisionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionStore").finish_non_exhaustive()
    }
}

impl RevisionStore {
    pub fn new(client: Arc<dyn InstancetypeClientTrait>) -> Self {
        Self { client }
    }

    /// Stores the revision of `template` for `vm` unless an equal one exists.
    ///
    /// An existing revision with the same name but a different spec is a
    /// [`InstancetypeError::RevisionMismatch`] and is left untouched.
    pub async fn store_once<S: Serialize>(
        &self,
        vm: &VirtualMachine,
        template: &Template<S>,
    ) -> Result<ControllerRevision, InstancetypeError> {
        let namespace = vm_namespace(vm)?;
        let revision = build_revision(vm, template)?;
        let name = revision.name_any();

        match self.client.create_controller_revision(namespace, &revision).await {
            Ok(created) => {
                info!("Stored ControllerRevision {}/{}", namespace, name);
                Ok(created)
            }
            Err(err) if err.is_already_exists() => {
                let existing = self.client.get_controller_revision(namespace, &name).await?;
                if compare(&existing, &revision)? {
                    debug!("ControllerRevision {}/{} already stored", namespace, name);
                    Ok(existing)
                } else {
                    Err(InstancetypeError::RevisionMismatch(name))
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Freezes the live templates of `vm` and pins its matchers to them.
    ///
    /// Matchers that already name a revision are skipped. Both pins are sent
    /// as one patch whose `test` operations fail if another writer pinned
    /// first; nothing is sent when there is nothing to pin.
    pub async fn store(
        &self,
        vm: &VirtualMachine,
        instancetype: Option<&InstancetypeTemplate>,
        preference: Option<&PreferenceTemplate>,
    ) -> Result<(), InstancetypeError> {
        let mut operations: Vec<PatchOperation> = Vec::new();

        if let (Some(matcher), Some(template)) = (vm.spec.instancetype.as_ref(), instancetype) {
            if matcher.revision_name().is_none() {
                check_instancetype_conflicts(vm, &template.spec)?;
                let revision = self.store_once(vm, template).await?;
                operations.extend(pin_operations(TemplateFamily::Instancetype, &revision.name_any()));
            }
        }

        if let (Some(matcher), Some(template)) = (vm.spec.preference.as_ref(), preference) {
            if matcher.revision_name().is_none() {
                let revision = self.store_once(vm, template).await?;
                operations.extend(pin_operations(TemplateFamily::Preference, &revision.name_any()));
            }
        }

        if operations.is_empty() {
            return Ok(());
        }

        let namespace = vm_namespace(vm)?;
        let name = vm.name_any();
        self.client.patch_virtual_machine(namespace, &name, &operations).await?;
        info!("Pinned VirtualMachine {}/{} to its revisions", namespace, name);
        Ok(())
    }
}
