//! Entry point used by the virtual machine controller

use crate::apply::apply_to_vm;
use crate::error::InstancetypeError;
use crate::find::TemplateResolver;
use crate::revision::RevisionStore;
use crds::VirtualMachine;
use kube::ResourceExt;
use tracing::{debug, info};

/// Resolves, applies and freezes the templates of virtual machines.
#[derive(Debug, Clone)]
pub struct InstancetypeHandler {
    resolver: TemplateResolver,
    store: RevisionStore,
}

impl InstancetypeHandler {
    pub fn new(resolver: TemplateResolver, store: RevisionStore) -> Self {
        Self { resolver, store }
    }

    #[must_use]
    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    /// Verifies that the templates of `vm` apply cleanly, then freezes the
    /// ones not pinned yet and pins `vm` to them.
    ///
    /// `vm` itself is never modified; the templates are applied to a copy
    /// only to detect conflicts.
    pub async fn apply_to_instance(&self, vm: &VirtualMachine) -> Result<(), InstancetypeError> {
        if vm.spec.instancetype.is_none() && vm.spec.preference.is_none() {
            debug!("VirtualMachine {} references no instancetype or preference", vm.name_any());
            return Ok(());
        }

        let instancetype = self.resolver.resolve_instancetype(vm).await?;
        let preference = self.resolver.resolve_preference(vm).await?;

        let mut expanded = vm.clone();
        apply_to_vm(
            &mut expanded,
            instancetype.as_ref().map(|resolved| resolved.spec()),
            preference.as_ref().map(|resolved| resolved.spec()),
        )?;

        let pending_instancetype = instancetype.as_ref().and_then(|resolved| resolved.live());
        let pending_preference = preference.as_ref().and_then(|resolved| resolved.live());
        if pending_instancetype.is_none() && pending_preference.is_none() {
            return Ok(());
        }

        info!(
            "Storing revisions for VirtualMachine {}/{}",
            vm.namespace().unwrap_or_default(),
            vm.name_any()
        );
        self.store.store(vm, pending_instancetype, pending_preference).await
    }
}

#[cfg(test)]
#[path = "handler_test.rs"]
mod handler_test;
