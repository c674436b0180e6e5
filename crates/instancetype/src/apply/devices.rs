use super::conflicts::{Conflicts, FieldPath};
use crds::{VirtualMachineInstanceSpec, VirtualMachineInstancetypeSpec};

pub(crate) fn apply_gpus(
    field: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    if instancetype.gpus.is_empty() {
        return Conflicts::new();
    }
    let devices = &mut spec.domain.devices;
    if !devices.gpus.is_empty() {
        return field.children(&["domain", "devices", "gpus"]).into();
    }
    devices.gpus.clone_from(&instancetype.gpus);
    Conflicts::new()
}

pub(crate) fn apply_host_devices(
    field: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    if instancetype.host_devices.is_empty() {
        return Conflicts::new();
    }
    let devices = &mut spec.domain.devices;
    if !devices.host_devices.is_empty() {
        return field.children(&["domain", "devices", "hostDevices"]).into();
    }
    devices.host_devices.clone_from(&instancetype.host_devices);
    Conflicts::new()
}
