//! Instance types and preferences for virtual machines
//!
//! - [`find`] resolves the templates a virtual machine references, either
//!   live or through the revision it has been pinned to.
//! - [`apply`] overlays an instance type (mandatory, conflict reporting) and
//!   [`preference`] overlays a preference (soft defaults) onto an instance spec.
//! - [`revision`] freezes templates into immutable `ControllerRevision`s and
//!   pins the virtual machine to them.
//! - [`upgrade`] migrates stored revisions to the latest schema version.
//! - [`handler`] ties resolution, apply and storage together for the controller.

pub mod apply;
pub mod compatibility;
pub mod error;
pub mod expand;
pub mod find;
pub mod handler;
pub mod preference;
pub mod revision;
pub mod template;
pub mod upgrade;

#[cfg(test)]
mod test_fixtures;

pub use apply::conflicts::{Conflicts, FieldPath};
pub use error::InstancetypeError;
pub use expand::expand_virtual_machine;
pub use find::{ResolvedTemplate, TemplateCaches, TemplateResolver};
pub use handler::InstancetypeHandler;
pub use revision::RevisionStore;
pub use template::{InstancetypeTemplate, PreferenceTemplate, Template};
pub use upgrade::{RevisionUpgrader, SchemaUpgrader, UpgradeReconciler};
