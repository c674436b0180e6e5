use super::conflicts::FieldPath;
use super::vmi::apply_to_vmi;
use crate::error::InstancetypeError;
use crds::{VirtualMachine, VirtualMachineInstancetypeSpec, VirtualMachinePreferenceSpec};

/// Root of conflict paths when applying to a virtual machine's template.
fn template_spec_path() -> FieldPath {
    FieldPath::new("spec").children(&["template", "spec"])
}

/// Applies resolved templates to the instance template of `vm` in place.
///
/// All conflicts are reported together in one error. On error `vm` may be
/// partially written.
pub fn apply_to_vm(
    vm: &mut VirtualMachine,
    instancetype: Option<&VirtualMachineInstancetypeSpec>,
    preference: Option<&VirtualMachinePreferenceSpec>,
) -> Result<(), InstancetypeError> {
    let template = &mut vm.spec.template;
    let annotations = template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(Default::default);

    let conflicts = apply_to_vmi(&template_spec_path(), instancetype, preference, &mut template.spec, annotations);
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(InstancetypeError::Conflicts(conflicts))
    }
}

/// Checks whether `instancetype` could be applied to `vm`, without touching it.
pub fn check_instancetype_conflicts(
    vm: &VirtualMachine,
    instancetype: &VirtualMachineInstancetypeSpec,
) -> Result<(), InstancetypeError> {
    let mut probe = vm.clone();
    apply_to_vm(&mut probe, Some(instancetype), None)
}
