//! Template Resolver
//!
//! Looks templates up for a virtual machine. A matcher pinned to a revision
//! always resolves through that revision, so a frozen template never drifts
//! when the live object is edited or deleted. Live lookups read the local
//! cache first and fall back to the client; a not-found from the client is
//! returned unchanged.

use crate::compatibility::{decode_instancetype, decode_preference};
use crate::error::InstancetypeError;
use crate::template::{InstancetypeTemplate, PreferenceTemplate, Template};
use crds::{
    TemplateMatcher, TemplateScope, VirtualMachine, VirtualMachineClusterInstancetype,
    VirtualMachineClusterPreference, VirtualMachineInstancetype, VirtualMachineInstancetypeSpec,
    VirtualMachinePreference, VirtualMachinePreferenceSpec,
};
use instancetype_client::{ClientError, InstancetypeClientTrait, ObjectCache};
use k8s_openapi::api::apps::v1::ControllerRevision;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::debug;

/// Optional read-only caches, one per object type.
///
/// A missing cache sends every lookup of that type to the client.
#[derive(Clone, Default)]
pub struct TemplateCaches {
    pub instancetypes: Option<Arc<dyn ObjectCache<VirtualMachineInstancetype>>>,
    pub cluster_instancetypes: Option<Arc<dyn ObjectCache<VirtualMachineClusterInstancetype>>>,
    pub preferences: Option<Arc<dyn ObjectCache<VirtualMachinePreference>>>,
    pub cluster_preferences: Option<Arc<dyn ObjectCache<VirtualMachineClusterPreference>>>,
    pub revisions: Option<Arc<dyn ObjectCache<ControllerRevision>>>,
}

impl std::fmt::Debug for TemplateCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCaches")
            .field("instancetypes", &self.instancetypes.is_some())
            .field("cluster_instancetypes", &self.cluster_instancetypes.is_some())
            .field("preferences", &self.preferences.is_some())
            .field("cluster_preferences", &self.cluster_preferences.is_some())
            .field("revisions", &self.revisions.is_some())
            .finish()
    }
}

/// A template as it applies to a virtual machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTemplate<S> {
    /// Read from the revision the matcher is pinned to
    Pinned { revision_name: String, spec: S },
    /// Read from the live object, not frozen yet
    Live(Template<S>),
}

impl<S> ResolvedTemplate<S> {
    /// Spec to apply.
    pub fn spec(&self) -> &S {
        match self {
            Self::Pinned { spec, .. } => spec,
            Self::Live(template) => &template.spec,
        }
    }

    /// Spec to apply, by value.
    pub fn into_spec(self) -> S {
        match self {
            Self::Pinned { spec, .. } => spec,
            Self::Live(template) => template.spec,
        }
    }

    /// Live template that still has to be frozen, if any.
    pub fn live(&self) -> Option<&Template<S>> {
        match self {
            Self::Pinned { .. } => None,
            Self::Live(template) => Some(template),
        }
    }
}

/// Resolves the instance type and preference of virtual machines.
#[derive(Clone)]
pub struct TemplateResolver {
    client: Arc<dyn InstancetypeClientTrait>,
    caches: TemplateCaches,
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResolver").field("caches", &self.caches).finish_non_exhaustive()
    }
}

impl TemplateResolver {
    pub fn new(client: Arc<dyn InstancetypeClientTrait>, caches: TemplateCaches) -> Self {
        Self { client, caches }
    }

    /// Resolves the instance type of `vm`; `None` when it has no instance type.
    pub async fn resolve_instancetype(
        &self,
        vm: &VirtualMachine,
    ) -> Result<Option<ResolvedTemplate<VirtualMachineInstancetypeSpec>>, InstancetypeError> {
        let Some(matcher) = vm.spec.instancetype.as_ref() else {
            return Ok(None);
        };
        let namespace = vm_namespace(vm)?;
        if let Some(revision_name) = matcher.revision_name() {
            let revision = self.find_revision(namespace, revision_name).await?;
            return Ok(Some(ResolvedTemplate::Pinned {
                revision_name: revision_name.to_string(),
                spec: decode_instancetype(&revision)?,
            }));
        }
        let template = self.live_instancetype(namespace, matcher).await?;
        Ok(Some(ResolvedTemplate::Live(template)))
    }

    /// Resolves the preference of `vm`; `None` when it has no preference.
    pub async fn resolve_preference(
        &self,
        vm: &VirtualMachine,
    ) -> Result<Option<ResolvedTemplate<VirtualMachinePreferenceSpec>>, InstancetypeError> {
        let Some(matcher) = vm.spec.preference.as_ref() else {
            return Ok(None);
        };
        let namespace = vm_namespace(vm)?;
        if let Some(revision_name) = matcher.revision_name() {
            let revision = self.find_revision(namespace, revision_name).await?;
            return Ok(Some(ResolvedTemplate::Pinned {
                revision_name: revision_name.to_string(),
                spec: decode_preference(&revision)?,
            }));
        }
        let template = self.live_preference(namespace, matcher).await?;
        Ok(Some(ResolvedTemplate::Live(template)))
    }

    /// Instance type spec that applies to `vm`.
    pub async fn resolve_instancetype_spec(
        &self,
        vm: &VirtualMachine,
    ) -> Result<Option<VirtualMachineInstancetypeSpec>, InstancetypeError> {
        Ok(self.resolve_instancetype(vm).await?.map(ResolvedTemplate::into_spec))
    }

    /// Preference spec that applies to `vm`.
    pub async fn resolve_preference_spec(
        &self,
        vm: &VirtualMachine,
    ) -> Result<Option<VirtualMachinePreferenceSpec>, InstancetypeError> {
        Ok(self.resolve_preference(vm).await?.map(ResolvedTemplate::into_spec))
    }

    /// Looks up the live instance type a matcher names.
    pub async fn live_instancetype(
        &self,
        namespace: &str,
        matcher: &impl TemplateMatcher,
    ) -> Result<InstancetypeTemplate, InstancetypeError> {
        let name = matcher.name();
        let template = match matcher.scope()? {
            TemplateScope::Namespaced => {
                let object = match cached(self.caches.instancetypes.as_ref(), Some(namespace), name) {
                    Some(object) => object,
                    None => self.client.get_instancetype(namespace, name).await?,
                };
                InstancetypeTemplate::from(object)
            }
            TemplateScope::Cluster => {
                let object = match cached(self.caches.cluster_instancetypes.as_ref(), None, name) {
                    Some(object) => object,
                    None => self.client.get_cluster_instancetype(name).await?,
                };
                InstancetypeTemplate::from(object)
            }
        };
        Ok(template)
    }

    /// Looks up the live preference a matcher names.
    pub async fn live_preference(
        &self,
        namespace: &str,
        matcher: &impl TemplateMatcher,
    ) -> Result<PreferenceTemplate, InstancetypeError> {
        let name = matcher.name();
        let template = match matcher.scope()? {
            TemplateScope::Namespaced => {
                let object = match cached(self.caches.preferences.as_ref(), Some(namespace), name) {
                    Some(object) => object,
                    None => self.client.get_preference(namespace, name).await?,
                };
                PreferenceTemplate::from(object)
            }
            TemplateScope::Cluster => {
                let object = match cached(self.caches.cluster_preferences.as_ref(), None, name) {
                    Some(object) => object,
                    None => self.client.get_cluster_preference(name).await?,
                };
                PreferenceTemplate::from(object)
            }
        };
        Ok(template)
    }

    /// Looks up a stored revision by name.
    pub async fn find_revision(&self, namespace: &str, name: &str) -> Result<ControllerRevision, ClientError> {
        if let Some(revision) = cached(self.caches.revisions.as_ref(), Some(namespace), name) {
            return Ok(revision);
        }
        debug!("ControllerRevision {}/{} not cached, fetching", namespace, name);
        self.client.get_controller_revision(namespace, name).await
    }
}

fn cached<K>(cache: Option<&Arc<dyn ObjectCache<K>>>, namespace: Option<&str>, name: &str) -> Option<K> {
    cache?.get_cached(namespace, name)
}

pub(crate) fn vm_namespace(vm: &VirtualMachine) -> Result<&str, InstancetypeError> {
    vm.metadata
        .namespace
        .as_deref()
        .ok_or_else(|| InstancetypeError::InvalidObject(format!("VirtualMachine {} has no namespace", vm.name_any())))
}

#[cfg(test)]
#[path = "find_test.rs"]
mod find_test;
