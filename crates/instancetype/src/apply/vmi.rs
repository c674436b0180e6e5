use super::annotations::apply_instancetype_annotations;
use super::conflicts::{Conflicts, FieldPath};
use super::cpu::apply_cpu;
use super::devices::{apply_gpus, apply_host_devices};
use super::domain::{apply_io_threads_policy, apply_launch_security};
use super::memory::apply_memory;
use super::placement::{apply_node_selector, apply_scheduler_name};
use crate::preference::apply_preferences;
use crds::{VirtualMachineInstanceSpec, VirtualMachineInstancetypeSpec, VirtualMachinePreferenceSpec};
use std::collections::BTreeMap;

/// Overlays an instance type and then a preference onto an instance spec.
///
/// Conflict paths are rooted at `field`. The preference pass only runs when
/// the instance type pass reported nothing; it never conflicts. A non-empty
/// result means `spec` may be partially written and has to be discarded.
pub fn apply_to_vmi(
    field: &FieldPath,
    instancetype: Option<&VirtualMachineInstancetypeSpec>,
    preference: Option<&VirtualMachinePreferenceSpec>,
    spec: &mut VirtualMachineInstanceSpec,
    annotations: &mut BTreeMap<String, String>,
) -> Conflicts {
    let mut conflicts = Conflicts::new();

    if let Some(instancetype) = instancetype {
        conflicts.extend(apply_node_selector(field, instancetype, spec));
        conflicts.extend(apply_scheduler_name(field, instancetype, spec));
        conflicts.extend(apply_cpu(field, instancetype, preference, spec));
        conflicts.extend(apply_memory(field, instancetype, spec));
        conflicts.extend(apply_io_threads_policy(field, instancetype, spec));
        conflicts.extend(apply_launch_security(field, instancetype, spec));
        conflicts.extend(apply_gpus(field, instancetype, spec));
        conflicts.extend(apply_host_devices(field, instancetype, spec));
        conflicts.extend(apply_instancetype_annotations(&instancetype.annotations, annotations));
    }

    if !conflicts.is_empty() {
        return conflicts;
    }

    if let Some(preference) = preference {
        apply_preferences(preference, spec, annotations);
    }
    conflicts
}
