use crds::{DevicePreferences, DiskTarget, VirtualMachineInstanceSpec, VirtualMachinePreferenceSpec};

pub(super) fn apply_device_preferences(preference: &VirtualMachinePreferenceSpec, spec: &mut VirtualMachineInstanceSpec) {
    let Some(preferred) = &preference.devices else {
        return;
    };

    let devices = &mut spec.domain.devices;
    fill(&mut devices.autoattach_graphics_device, preferred.preferred_autoattach_graphics_device);
    fill(&mut devices.autoattach_memory_balloon, preferred.preferred_autoattach_memory_balloon);
    fill(&mut devices.autoattach_pod_interface, preferred.preferred_autoattach_pod_interface);
    fill(&mut devices.autoattach_serial_console, preferred.preferred_autoattach_serial_console);
    fill(&mut devices.autoattach_input_device, preferred.preferred_autoattach_input_device);

    apply_disk_preferences(preferred, spec);
    apply_interface_preferences(preferred, spec);
}

fn fill<T: Copy>(target: &mut Option<T>, preferred: Option<T>) {
    if target.is_none() {
        *target = preferred;
    }
}

fn apply_disk_preferences(preferred: &DevicePreferences, spec: &mut VirtualMachineInstanceSpec) {
    for disk in &mut spec.domain.devices.disks {
        if disk.disk.is_none() && disk.cdrom.is_none() {
            disk.disk = Some(DiskTarget::default());
        }
        if let Some(target) = disk.disk.as_mut() {
            if target.bus.is_empty() {
                target.bus.clone_from(&preferred.preferred_disk_bus);
            }
        }
        if let Some(target) = disk.cdrom.as_mut() {
            if target.bus.is_empty() {
                target.bus.clone_from(&preferred.preferred_cdrom_bus);
            }
        }
    }
}

fn apply_interface_preferences(preferred: &DevicePreferences, spec: &mut VirtualMachineInstanceSpec) {
    let networks = &spec.networks;
    let on_pod_network = |name: &str| {
        networks
            .iter()
            .find(|network| network.name == name)
            .is_some_and(|network| network.pod.is_some())
    };

    for iface in &mut spec.domain.devices.interfaces {
        if iface.model.is_empty() {
            iface.model.clone_from(&preferred.preferred_interface_model);
        }
        if preferred.preferred_interface_masquerade.is_some() && iface.binding_unset() && on_pod_network(&iface.name) {
            iface.masquerade.clone_from(&preferred.preferred_interface_masquerade);
        }
    }
}
