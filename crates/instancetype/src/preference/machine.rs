use crds::{VirtualMachineInstanceSpec, VirtualMachinePreferenceSpec};

pub(super) fn apply_machine_preferences(preference: &VirtualMachinePreferenceSpec, spec: &mut VirtualMachineInstanceSpec) {
    let Some(preferred) = &preference.machine else {
        return;
    };

    let machine = spec.domain.machine.get_or_insert_with(Default::default);
    if machine.machine_type.is_empty() {
        machine.machine_type.clone_from(&preferred.preferred_machine_type);
    }
}
