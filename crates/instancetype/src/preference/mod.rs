//! Preference apply pass
//!
//! Every applier writes a preferred value only where the instance spec leaves
//! the field unset. Nothing here can fail or conflict.

mod clock;
mod cpu;
mod devices;
mod features;
mod firmware;
mod machine;

use crds::{VirtualMachineInstanceSpec, VirtualMachinePreferenceSpec};
use std::collections::BTreeMap;

/// Applies `preference` onto `spec` and the instance `annotations`.
pub fn apply_preferences(
    preference: &VirtualMachinePreferenceSpec,
    spec: &mut VirtualMachineInstanceSpec,
    annotations: &mut BTreeMap<String, String>,
) {
    cpu::apply_cpu_preferences(preference, spec);
    devices::apply_device_preferences(preference, spec);
    features::apply_feature_preferences(preference, spec);
    firmware::apply_firmware_preferences(preference, spec);
    machine::apply_machine_preferences(preference, spec);
    clock::apply_clock_preferences(preference, spec);

    if spec.subdomain.is_empty() {
        if let Some(subdomain) = &preference.preferred_subdomain {
            spec.subdomain.clone_from(subdomain);
        }
    }
    if spec.termination_grace_period_seconds.is_none() {
        spec.termination_grace_period_seconds = preference.preferred_termination_grace_period_seconds;
    }
    for (key, value) in &preference.annotations {
        annotations.entry(key.clone()).or_insert_with(|| value.clone());
    }
}
