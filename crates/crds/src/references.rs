//! Template references held by a `VirtualMachine`
//!
//! A virtual machine points at its instance type and preference through a
//! matcher: a name, a free-form kind string (case-insensitive, singular or
//! plural) and, once the controller has frozen the template, the name of the
//! `ControllerRevision` holding that frozen copy.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Singular resource name of namespaced instance types.
pub const INSTANCETYPE_SINGULAR: &str = "virtualmachineinstancetype";
/// Plural resource name of namespaced instance types.
pub const INSTANCETYPE_PLURAL: &str = "virtualmachineinstancetypes";
/// Singular resource name of cluster instance types.
pub const CLUSTER_INSTANCETYPE_SINGULAR: &str = "virtualmachineclusterinstancetype";
/// Plural resource name of cluster instance types.
pub const CLUSTER_INSTANCETYPE_PLURAL: &str = "virtualmachineclusterinstancetypes";
/// Singular resource name of namespaced preferences.
pub const PREFERENCE_SINGULAR: &str = "virtualmachinepreference";
/// Plural resource name of namespaced preferences.
pub const PREFERENCE_PLURAL: &str = "virtualmachinepreferences";
/// Singular resource name of cluster preferences.
pub const CLUSTER_PREFERENCE_SINGULAR: &str = "virtualmachineclusterpreference";
/// Plural resource name of cluster preferences.
pub const CLUSTER_PREFERENCE_PLURAL: &str = "virtualmachineclusterpreferences";

/// Labels stamped on every stored revision, describing the frozen object.
pub mod revision_labels {
    /// Generation of the template at the time it was frozen
    pub const OBJECT_GENERATION: &str = "instancetype.kubevirt.io/object-generation";
    /// Kind of the frozen template
    pub const OBJECT_KIND: &str = "instancetype.kubevirt.io/object-kind";
    /// Name of the frozen template
    pub const OBJECT_NAME: &str = "instancetype.kubevirt.io/object-name";
    /// UID of the frozen template
    pub const OBJECT_UID: &str = "instancetype.kubevirt.io/object-uid";
    /// Schema version the template was encoded with
    pub const OBJECT_VERSION: &str = "instancetype.kubevirt.io/object-version";
}

/// Where a template is looked up.
///
/// Kind strings are parsed into a scope once at the boundary; everything
/// downstream dispatches on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateScope {
    /// Lives in the namespace of the virtual machine
    Namespaced,
    /// Cluster-wide object
    Cluster,
}

/// Which family of template a matcher or revision refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFamily {
    /// Instance types (mandatory values)
    Instancetype,
    /// Preferences (soft defaults)
    Preference,
}

impl TemplateFamily {
    /// Name of the matcher used in error messages.
    #[must_use]
    pub fn matcher_name(self) -> &'static str {
        match self {
            Self::Instancetype => "InstancetypeMatcher",
            Self::Preference => "PreferenceMatcher",
        }
    }

    /// JSON pointer of the matcher inside a `VirtualMachine`.
    #[must_use]
    pub fn matcher_path(self) -> &'static str {
        match self {
            Self::Instancetype => "/spec/instancetype",
            Self::Preference => "/spec/preference",
        }
    }

    /// Resolves a kind string for this family into a scope.
    ///
    /// Matching is case-insensitive and accepts singular and plural resource
    /// names. An empty kind selects the cluster-scoped variant.
    pub fn scope_for_kind(self, kind: &str) -> Result<TemplateScope, UnknownKindError> {
        let lowered = kind.to_lowercase();
        let scope = match (self, lowered.as_str()) {
            (Self::Instancetype, INSTANCETYPE_SINGULAR | INSTANCETYPE_PLURAL)
            | (Self::Preference, PREFERENCE_SINGULAR | PREFERENCE_PLURAL) => TemplateScope::Namespaced,
            (Self::Instancetype, CLUSTER_INSTANCETYPE_SINGULAR | CLUSTER_INSTANCETYPE_PLURAL | "")
            | (Self::Preference, CLUSTER_PREFERENCE_SINGULAR | CLUSTER_PREFERENCE_PLURAL | "") => TemplateScope::Cluster,
            _ => {
                return Err(UnknownKindError {
                    family: self,
                    kind: kind.to_string(),
                });
            }
        };
        Ok(scope)
    }

    /// Object kind (as in `kind:` of the stored object) for a scope.
    #[must_use]
    pub fn object_kind(self, scope: TemplateScope) -> &'static str {
        match (self, scope) {
            (Self::Instancetype, TemplateScope::Namespaced) => "VirtualMachineInstancetype",
            (Self::Instancetype, TemplateScope::Cluster) => "VirtualMachineClusterInstancetype",
            (Self::Preference, TemplateScope::Namespaced) => "VirtualMachinePreference",
            (Self::Preference, TemplateScope::Cluster) => "VirtualMachineClusterPreference",
        }
    }

    /// Reverse of [`TemplateFamily::object_kind`].
    #[must_use]
    pub fn from_object_kind(kind: &str) -> Option<(Self, TemplateScope)> {
        match kind {
            "VirtualMachineInstancetype" => Some((Self::Instancetype, TemplateScope::Namespaced)),
            "VirtualMachineClusterInstancetype" => Some((Self::Instancetype, TemplateScope::Cluster)),
            "VirtualMachinePreference" => Some((Self::Preference, TemplateScope::Namespaced)),
            "VirtualMachineClusterPreference" => Some((Self::Preference, TemplateScope::Cluster)),
            _ => None,
        }
    }
}

impl fmt::Display for TemplateFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instancetype => f.write_str("instancetype"),
            Self::Preference => f.write_str("preference"),
        }
    }
}

/// A matcher carried a kind that does not belong to its template family.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("got unexpected kind in {}: {kind}", family.matcher_name())]
pub struct UnknownKindError {
    /// Family of the matcher
    pub family: TemplateFamily,
    /// The kind string as written
    pub kind: String,
}

/// Reference from a virtual machine to an instance type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstancetypeMatcher {
    /// Name of the instance type
    pub name: String,

    /// Kind of the instance type (defaults to the cluster-scoped kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Name of the revision holding the frozen instance type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
}

/// Reference from a virtual machine to a preference.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceMatcher {
    /// Name of the preference
    pub name: String,

    /// Kind of the preference (defaults to the cluster-scoped kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Name of the revision holding the frozen preference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
}

/// Read access shared by both matcher types.
pub trait TemplateMatcher {
    /// Template family this matcher points at
    const FAMILY: TemplateFamily;

    /// Name of the referenced template
    fn name(&self) -> &str;

    /// Kind string as written, empty when omitted
    fn kind(&self) -> &str;

    /// Pinned revision, if any (empty strings count as unset)
    fn revision_name(&self) -> Option<&str>;

    /// Resolves the kind string into a scope.
    fn scope(&self) -> Result<TemplateScope, UnknownKindError> {
        Self::FAMILY.scope_for_kind(self.kind())
    }
}

impl TemplateMatcher for InstancetypeMatcher {
    const FAMILY: TemplateFamily = TemplateFamily::Instancetype;

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }

    fn revision_name(&self) -> Option<&str> {
        self.revision_name.as_deref().filter(|name| !name.is_empty())
    }
}

impl TemplateMatcher for PreferenceMatcher {
    const FAMILY: TemplateFamily = TemplateFamily::Preference;

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }

    fn revision_name(&self) -> Option<&str> {
        self.revision_name.as_deref().filter(|name| !name.is_empty())
    }
}
