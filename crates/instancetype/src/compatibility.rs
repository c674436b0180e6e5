//! Decoding of stored revisions
//!
//! A revision holds a complete template object. Current revisions carry
//! `apiVersion`, `kind`, `metadata` and `spec` at any supported schema
//! version. The oldest revisions only carry `apiVersion` and the spec as
//! base64-encoded JSON; their kind and identity come from the revision labels.

use crate::error::InstancetypeError;
use crate::template::{InstancetypeTemplate, PreferenceTemplate, Template};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crds::{
    INSTANCETYPE_GROUP, LATEST_VERSION, LEGACY_VERSIONS, TemplateFamily, TemplateScope,
    VirtualMachineInstancetypeSpec, VirtualMachinePreferenceSpec, revision_labels,
};
use k8s_openapi::api::apps::v1::ControllerRevision;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Template decoded from a revision, at the latest schema.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRevision {
    Instancetype(InstancetypeTemplate),
    Preference(PreferenceTemplate),
}

impl DecodedRevision {
    #[must_use]
    pub fn family(&self) -> TemplateFamily {
        match self {
            Self::Instancetype(_) => TemplateFamily::Instancetype,
            Self::Preference(_) => TemplateFamily::Preference,
        }
    }

    /// Whether both revisions freeze the same template content.
    ///
    /// Metadata is ignored.
    #[must_use]
    pub fn same_spec(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Instancetype(a), Self::Instancetype(b)) => a.spec == b.spec,
            (Self::Preference(a), Self::Preference(b)) => a.spec == b.spec,
            _ => false,
        }
    }
}

/// Schema version a revision was encoded with, e.g. `v1alpha2`.
pub fn stored_version(revision: &ControllerRevision) -> Result<String, InstancetypeError> {
    let name = revision_name(revision);
    let data = payload(revision)?;
    let api_version = data
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| InstancetypeError::decode(name, "payload has no apiVersion"))?;
    parse_version(name, api_version).map(str::to_string)
}

/// Decodes a revision, optionally insisting on a template family.
pub fn decode(revision: &ControllerRevision, expected: Option<TemplateFamily>) -> Result<DecodedRevision, InstancetypeError> {
    let name = revision_name(revision);
    let data = payload(revision)?;
    let api_version = data
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| InstancetypeError::decode(name, "payload has no apiVersion"))?;
    parse_version(name, api_version)?;

    let kind = data
        .get("kind")
        .and_then(Value::as_str)
        .or_else(|| label(revision, revision_labels::OBJECT_KIND));
    let (family, scope) = match kind {
        Some(kind) => TemplateFamily::from_object_kind(kind)
            .ok_or_else(|| InstancetypeError::decode(name, format!("unexpected kind {kind}")))?,
        None => {
            let family = expected.ok_or_else(|| InstancetypeError::decode(name, "payload has no kind"))?;
            (family, TemplateScope::Namespaced)
        }
    };
    if let Some(expected) = expected {
        if expected != family {
            return Err(InstancetypeError::decode(
                name,
                format!("expected {expected} but found {}", family.object_kind(scope)),
            ));
        }
    }

    let (metadata, spec) = match data.get("spec") {
        Some(Value::String(encoded)) => (metadata_from_labels(revision), legacy_spec(name, encoded)?),
        Some(spec) => (object_metadata(name, data)?, spec.clone()),
        None => return Err(InstancetypeError::decode(name, "payload has no spec")),
    };

    Ok(match family {
        TemplateFamily::Instancetype => DecodedRevision::Instancetype(template(name, family, scope, metadata, spec)?),
        TemplateFamily::Preference => DecodedRevision::Preference(template(name, family, scope, metadata, spec)?),
    })
}

/// Decodes a revision expected to hold an instance type.
pub fn decode_instancetype(revision: &ControllerRevision) -> Result<VirtualMachineInstancetypeSpec, InstancetypeError> {
    match decode(revision, Some(TemplateFamily::Instancetype))? {
        DecodedRevision::Instancetype(template) => Ok(template.spec),
        DecodedRevision::Preference(_) => Err(InstancetypeError::decode(revision_name(revision), "not an instancetype")),
    }
}

/// Decodes a revision expected to hold a preference.
pub fn decode_preference(revision: &ControllerRevision) -> Result<VirtualMachinePreferenceSpec, InstancetypeError> {
    match decode(revision, Some(TemplateFamily::Preference))? {
        DecodedRevision::Preference(template) => Ok(template.spec),
        DecodedRevision::Instancetype(_) => Err(InstancetypeError::decode(revision_name(revision), "not a preference")),
    }
}

fn revision_name(revision: &ControllerRevision) -> &str {
    revision.metadata.name.as_deref().unwrap_or_default()
}

fn label<'a>(revision: &'a ControllerRevision, key: &str) -> Option<&'a str> {
    revision.metadata.labels.as_ref()?.get(key).map(String::as_str)
}

fn payload(revision: &ControllerRevision) -> Result<&Value, InstancetypeError> {
    match revision.data.as_ref() {
        Some(data) if data.0.is_object() => Ok(&data.0),
        _ => Err(InstancetypeError::decode(revision_name(revision), "revision has no object payload")),
    }
}

fn parse_version<'a>(name: &str, api_version: &'a str) -> Result<&'a str, InstancetypeError> {
    let version = api_version
        .strip_prefix(INSTANCETYPE_GROUP)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| InstancetypeError::decode(name, format!("unexpected apiVersion {api_version}")))?;
    if version == LATEST_VERSION || LEGACY_VERSIONS.contains(&version) {
        Ok(version)
    } else {
        Err(InstancetypeError::decode(name, format!("unsupported version {version}")))
    }
}

fn legacy_spec(name: &str, encoded: &str) -> Result<Value, InstancetypeError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| InstancetypeError::decode(name, format!("invalid base64 spec: {err}")))?;
    serde_json::from_slice(&bytes).map_err(|err| InstancetypeError::decode(name, format!("invalid spec: {err}")))
}

fn object_metadata(name: &str, data: &Value) -> Result<ObjectMeta, InstancetypeError> {
    match data.get("metadata") {
        Some(metadata) => serde_json::from_value(metadata.clone())
            .map_err(|err| InstancetypeError::decode(name, format!("invalid metadata: {err}"))),
        None => Ok(ObjectMeta::default()),
    }
}

fn metadata_from_labels(revision: &ControllerRevision) -> ObjectMeta {
    ObjectMeta {
        name: label(revision, revision_labels::OBJECT_NAME).map(str::to_string),
        uid: label(revision, revision_labels::OBJECT_UID).map(str::to_string),
        generation: label(revision, revision_labels::OBJECT_GENERATION).and_then(|value| value.parse().ok()),
        ..ObjectMeta::default()
    }
}

fn template<S: DeserializeOwned>(
    name: &str,
    family: TemplateFamily,
    scope: TemplateScope,
    metadata: ObjectMeta,
    spec: Value,
) -> Result<Template<S>, InstancetypeError> {
    let spec = serde_json::from_value(spec).map_err(|err| InstancetypeError::decode(name, format!("invalid spec: {err}")))?;
    Ok(Template {
        family,
        scope,
        metadata,
        spec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn revision(data: Value, labels: &[(&str, &str)]) -> ControllerRevision {
        ControllerRevision {
            metadata: ObjectMeta {
                name: Some("vm-it-v1alpha1-uid-1".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect::<BTreeMap<_, _>>(),
                ),
                ..ObjectMeta::default()
            },
            data: Some(RawExtension(data)),
            revision: 0,
        }
    }

    #[test]
    fn test_decodes_full_object_at_legacy_version() {
        let revision = revision(
            json!({
                "apiVersion": "instancetype.kubevirt.io/v1alpha2",
                "kind": "VirtualMachineClusterInstancetype",
                "metadata": { "name": "u1.small", "uid": "uid-1", "generation": 1 },
                "spec": { "cpu": { "guest": 1 }, "memory": { "guest": "2Gi" } }
            }),
            &[],
        );

        assert_eq!(stored_version(&revision).unwrap(), "v1alpha2");
        let DecodedRevision::Instancetype(template) = decode(&revision, None).unwrap() else {
            panic!("expected an instancetype");
        };
        assert_eq!(template.scope, TemplateScope::Cluster);
        assert_eq!(template.name(), "u1.small");
        assert_eq!(template.spec.memory.guest.as_str(), "2Gi");
    }

    #[test]
    fn test_decodes_base64_spec_using_labels() {
        let spec = STANDARD.encode(br#"{"preferredSubdomain":"db","cpu":{"preferredCPUTopology":"preferCores"}}"#);
        let revision = revision(
            json!({ "apiVersion": "instancetype.kubevirt.io/v1alpha1", "spec": spec }),
            &[
                (revision_labels::OBJECT_KIND, "VirtualMachinePreference"),
                (revision_labels::OBJECT_NAME, "fedora"),
                (revision_labels::OBJECT_UID, "uid-2"),
                (revision_labels::OBJECT_GENERATION, "4"),
            ],
        );

        let spec = decode_preference(&revision).unwrap();
        assert_eq!(spec.preferred_subdomain.as_deref(), Some("db"));
        assert_eq!(spec.preferred_topology(), crds::PreferredCpuTopology::Cores);

        let DecodedRevision::Preference(template) = decode(&revision, None).unwrap() else {
            panic!("expected a preference");
        };
        assert_eq!(template.uid(), "uid-2");
        assert_eq!(template.generation(), 4);
    }

    #[test]
    fn test_wrong_family_is_a_decode_error() {
        let revision = revision(
            json!({
                "apiVersion": "instancetype.kubevirt.io/v1beta1",
                "kind": "VirtualMachinePreference",
                "spec": {}
            }),
            &[],
        );

        let err = decode_instancetype(&revision).unwrap_err();
        assert!(matches!(err, InstancetypeError::Decode { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_foreign_api_version_is_rejected() {
        let revision = revision(json!({ "apiVersion": "apps/v1", "kind": "Deployment", "spec": {} }), &[]);
        assert!(matches!(decode(&revision, None), Err(InstancetypeError::Decode { .. })));
        assert!(stored_version(&revision).is_err());
    }
}
