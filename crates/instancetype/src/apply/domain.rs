use super::conflicts::{Conflicts, FieldPath};
use crds::{VirtualMachineInstanceSpec, VirtualMachineInstancetypeSpec};

pub(crate) fn apply_io_threads_policy(
    field: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let Some(policy) = &instancetype.io_threads_policy else {
        return Conflicts::new();
    };
    if spec.domain.io_threads_policy.is_some() {
        return field.children(&["domain", "ioThreadsPolicy"]).into();
    }
    spec.domain.io_threads_policy = Some(policy.clone());
    Conflicts::new()
}

pub(crate) fn apply_launch_security(
    field: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let Some(launch_security) = &instancetype.launch_security else {
        return Conflicts::new();
    };
    if spec.domain.launch_security.is_some() {
        return field.children(&["domain", "launchSecurity"]).into();
    }
    spec.domain.launch_security = Some(launch_security.clone());
    Conflicts::new()
}
