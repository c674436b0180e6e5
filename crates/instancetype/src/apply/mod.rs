//! Instance type apply engine
//!
//! Appliers run in a fixed order. Each one checks its own domain for values
//! the target spec already has; on a conflict it records the path and leaves
//! that domain alone, otherwise it writes the instance type's values. The
//! pass is not transactional: a conflict in one domain does not undo writes
//! to another, so a target that produced conflicts must be discarded.
//!
//! Preferences are only applied once the instance type pass is clean.

mod annotations;
pub mod conflicts;
mod cpu;
mod devices;
mod domain;
mod memory;
mod placement;
pub mod topology;
mod vm;
mod vmi;

pub use annotations::apply_instancetype_annotations;
pub use conflicts::{Conflicts, FieldPath};
pub use topology::{CpuTopology, guest_topology};
pub use vm::{apply_to_vm, check_instancetype_conflicts};
pub use vmi::apply_to_vmi;
