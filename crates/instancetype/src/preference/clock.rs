use crds::{Clock, VirtualMachineInstanceSpec, VirtualMachinePreferenceSpec};

/// Sets the clock offset when the instance has no clock, and the timer when
/// it has none.
pub(super) fn apply_clock_preferences(preference: &VirtualMachinePreferenceSpec, spec: &mut VirtualMachineInstanceSpec) {
    let Some(preferred) = &preference.clock else {
        return;
    };

    let clock = spec.domain.clock.get_or_insert_with(|| Clock {
        offset: preferred.preferred_clock_offset.clone().unwrap_or_default(),
        timer: None,
    });
    if clock.timer.is_none() {
        clock.timer.clone_from(&preferred.preferred_timer);
    }
}
