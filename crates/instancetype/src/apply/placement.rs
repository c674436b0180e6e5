use super::conflicts::{Conflicts, FieldPath};
use crds::{VirtualMachineInstanceSpec, VirtualMachineInstancetypeSpec};

pub(crate) fn apply_node_selector(
    field: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let Some(node_selector) = &instancetype.node_selector else {
        return Conflicts::new();
    };
    if spec.node_selector.is_some() {
        return field.child("nodeSelector").into();
    }
    spec.node_selector = Some(node_selector.clone());
    Conflicts::new()
}

pub(crate) fn apply_scheduler_name(
    field: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let Some(scheduler_name) = instancetype.scheduler_name.as_deref().filter(|name| !name.is_empty()) else {
        return Conflicts::new();
    };
    if !spec.scheduler_name.is_empty() {
        return field.child("schedulerName").into();
    }
    spec.scheduler_name = scheduler_name.to_string();
    Conflicts::new()
}
