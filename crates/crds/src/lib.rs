//! Instancetype CRD Definitions
//!
//! Kubernetes resource types shared by the instancetype controller and its
//! libraries: reusable instance types and preferences (namespaced and
//! cluster-scoped), the `VirtualMachine` they are applied to, and the
//! `ControllerRevisionUpgrade` request used to migrate stored revisions.

pub mod instancetype;
pub mod preference;
pub mod quantity;
pub mod references;
pub mod upgrade;
pub mod virtual_machine;

mod serde_helpers;

pub use instancetype::*;
pub use preference::*;
pub use quantity::*;
pub use references::*;
pub use upgrade::*;
pub use virtual_machine::*;

/// API group of instance types, preferences and revision upgrades.
pub const INSTANCETYPE_GROUP: &str = "instancetype.kubevirt.io";

/// Newest schema version of the instancetype API group.
///
/// Revisions stored under an older version are migrated to this one by the
/// upgrade reconciler.
pub const LATEST_VERSION: &str = "v1beta1";

/// Older schema versions that may still be found inside stored revisions.
pub const LEGACY_VERSIONS: &[&str] = &["v1alpha1", "v1alpha2"];
