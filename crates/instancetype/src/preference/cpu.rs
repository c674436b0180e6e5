use crds::{VirtualMachineInstanceSpec, VirtualMachinePreferenceSpec};

/// Adds preferred CPU features the instance does not mention by name.
pub(super) fn apply_cpu_preferences(preference: &VirtualMachinePreferenceSpec, spec: &mut VirtualMachineInstanceSpec) {
    let Some(cpu_preferences) = &preference.cpu else {
        return;
    };
    if cpu_preferences.preferred_cpu_features.is_empty() {
        return;
    }

    let cpu = spec.domain.cpu.get_or_insert_with(Default::default);
    for feature in &cpu_preferences.preferred_cpu_features {
        if !cpu.features.iter().any(|existing| existing.name == feature.name) {
            cpu.features.push(feature.clone());
        }
    }
}
