use crds::{VirtualMachineInstanceSpec, VirtualMachinePreferenceSpec};

pub(super) fn apply_feature_preferences(preference: &VirtualMachinePreferenceSpec, spec: &mut VirtualMachineInstanceSpec) {
    let Some(preferred) = &preference.features else {
        return;
    };

    let features = spec.domain.features.get_or_insert_with(Default::default);
    if features.acpi.is_none() {
        features.acpi.clone_from(&preferred.preferred_acpi);
    }
    if features.smm.is_none() {
        features.smm.clone_from(&preferred.preferred_smm);
    }
}
