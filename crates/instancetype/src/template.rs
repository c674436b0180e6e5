//! Resolved templates
//!
//! Namespaced and cluster-wide templates share one spec schema. Once looked
//! up they are carried as a [`Template`] that remembers their family and
//! scope, so later stages never re-parse kind strings.

use crds::{
    INSTANCETYPE_GROUP, LATEST_VERSION, TemplateFamily, TemplateScope, VirtualMachineClusterInstancetype,
    VirtualMachineClusterPreference, VirtualMachineInstancetype, VirtualMachineInstancetypeSpec,
    VirtualMachinePreference, VirtualMachinePreferenceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;

/// A template object together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Template<S> {
    /// Instance type or preference
    pub family: TemplateFamily,
    /// Namespaced or cluster-wide
    pub scope: TemplateScope,
    /// Object metadata as stored
    pub metadata: ObjectMeta,
    /// Template content
    pub spec: S,
}

/// Resolved instance type of either scope
pub type InstancetypeTemplate = Template<VirtualMachineInstancetypeSpec>;

/// Resolved preference of either scope
pub type PreferenceTemplate = Template<VirtualMachinePreferenceSpec>;

impl<S> Template<S> {
    /// Object kind, e.g. `VirtualMachineClusterInstancetype`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.family.object_kind(self.scope)
    }

    /// Name of the template object.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// UID of the template object (empty when unknown).
    #[must_use]
    pub fn uid(&self) -> &str {
        self.metadata.uid.as_deref().unwrap_or_default()
    }

    /// Generation of the template object (zero when unknown).
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.metadata.generation.unwrap_or_default()
    }
}

impl<S: Serialize> Template<S> {
    /// Full object at the latest schema version, with metadata that must not
    /// be frozen removed.
    ///
    /// Labels, annotations, finalizers, owner references and managed fields
    /// are dropped so that only the template content is snapshotted.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        let metadata = ObjectMeta {
            labels: None,
            annotations: None,
            finalizers: None,
            owner_references: None,
            managed_fields: None,
            ..self.metadata.clone()
        };
        Ok(serde_json::json!({
            "apiVersion": format!("{INSTANCETYPE_GROUP}/{LATEST_VERSION}"),
            "kind": self.kind(),
            "metadata": serde_json::to_value(metadata)?,
            "spec": serde_json::to_value(&self.spec)?,
        }))
    }
}

impl From<VirtualMachineInstancetype> for InstancetypeTemplate {
    fn from(object: VirtualMachineInstancetype) -> Self {
        Self {
            family: TemplateFamily::Instancetype,
            scope: TemplateScope::Namespaced,
            metadata: object.metadata,
            spec: object.spec,
        }
    }
}

impl From<VirtualMachineClusterInstancetype> for InstancetypeTemplate {
    fn from(object: VirtualMachineClusterInstancetype) -> Self {
        Self {
            family: TemplateFamily::Instancetype,
            scope: TemplateScope::Cluster,
            metadata: object.metadata,
            spec: object.spec.into(),
        }
    }
}

impl From<VirtualMachinePreference> for PreferenceTemplate {
    fn from(object: VirtualMachinePreference) -> Self {
        Self {
            family: TemplateFamily::Preference,
            scope: TemplateScope::Namespaced,
            metadata: object.metadata,
            spec: object.spec,
        }
    }
}

impl From<VirtualMachineClusterPreference> for PreferenceTemplate {
    fn from(object: VirtualMachineClusterPreference) -> Self {
        Self {
            family: TemplateFamily::Preference,
            scope: TemplateScope::Cluster,
            metadata: object.metadata,
            spec: object.spec.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{ClusterPreferenceSpec, MachinePreferences};
    use std::collections::BTreeMap;

    #[test]
    fn test_payload_strips_volatile_metadata() {
        let mut preference = VirtualMachineClusterPreference::new(
            "fedora",
            ClusterPreferenceSpec(VirtualMachinePreferenceSpec {
                machine: Some(MachinePreferences {
                    preferred_machine_type: "q35".to_string(),
                }),
                ..VirtualMachinePreferenceSpec::default()
            }),
        );
        preference.metadata.uid = Some("uid-1".to_string());
        preference.metadata.generation = Some(3);
        preference.metadata.labels = Some(BTreeMap::from([("a".to_string(), "b".to_string())]));
        preference.metadata.finalizers = Some(vec!["keep".to_string()]);

        let template = PreferenceTemplate::from(preference);
        assert_eq!(template.kind(), "VirtualMachineClusterPreference");

        let payload = template.to_payload().unwrap();
        assert_eq!(payload["apiVersion"], "instancetype.kubevirt.io/v1beta1");
        assert_eq!(payload["kind"], "VirtualMachineClusterPreference");
        assert_eq!(payload["metadata"]["uid"], "uid-1");
        assert_eq!(payload["metadata"]["generation"], 3);
        assert!(payload["metadata"].get("labels").is_none());
        assert!(payload["metadata"].get("finalizers").is_none());
        assert_eq!(payload["spec"]["machine"]["preferredMachineType"], "q35");
    }
}
