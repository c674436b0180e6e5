//! Revision Store
//!
//! A template consumed by a virtual machine is frozen into an immutable
//! `ControllerRevision` named after the virtual machine and the template's
//! name, schema version, uid and generation. The virtual machine's matcher
//! is then pinned to that revision.

mod compare;
mod patch;
mod store;

pub use compare::compare;
pub use patch::{pin_operations, repin_operations};
pub use store::{RevisionStore, build_revision, revision_name};

#[cfg(test)]
mod revision_test;
