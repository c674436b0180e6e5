use super::conflicts::{Conflicts, FieldPath};
use super::topology::guest_topology;
use crds::{
    DEFAULT_SPREAD_RATIO, PreferredCpuTopology, SpreadAcross, VirtualMachineInstanceSpec, VirtualMachineInstancetypeSpec,
    VirtualMachinePreferenceSpec,
};

const RESOURCE_CPU: &str = "cpu";

/// Applies the guest CPU of the instance type, including its topology.
///
/// Any conflict leaves the CPU section untouched apart from creating it.
pub(crate) fn apply_cpu(
    field: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    preference: Option<&VirtualMachinePreferenceSpec>,
    spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let conflicts = validate_cpu(field, instancetype, spec);
    let cpu = spec.domain.cpu.get_or_insert_with(Default::default);
    if !conflicts.is_empty() {
        return conflicts;
    }

    let wanted = &instancetype.cpu;
    if cpu.model.is_empty() {
        if let Some(model) = &wanted.model {
            cpu.model.clone_from(model);
        }
    }
    if let Some(dedicated) = wanted.dedicated_cpu_placement {
        cpu.dedicated_cpu_placement = dedicated;
    }
    if let Some(isolate) = wanted.isolate_emulator_thread {
        cpu.isolate_emulator_thread = isolate;
    }
    if cpu.numa.is_none() {
        cpu.numa.clone_from(&wanted.numa);
    }
    if cpu.realtime.is_none() {
        cpu.realtime.clone_from(&wanted.realtime);
    }
    if let Some(max_sockets) = wanted.max_sockets {
        cpu.max_sockets = max_sockets;
    }

    let (strategy, (ratio, across)) = match preference {
        Some(preference) => (preference.preferred_topology(), preference.spread_options()),
        None => (PreferredCpuTopology::default(), (DEFAULT_SPREAD_RATIO, SpreadAcross::default())),
    };
    let topology = guest_topology(wanted.guest, strategy, ratio, across);
    cpu.cores = topology.cores;
    cpu.sockets = topology.sockets;
    cpu.threads = topology.threads;

    Conflicts::new()
}

fn validate_cpu(
    field: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    spec: &VirtualMachineInstanceSpec,
) -> Conflicts {
    let mut conflicts = Conflicts::new();
    let resources = &spec.domain.resources;
    if resources.requests.contains_key(RESOURCE_CPU) {
        conflicts.push(field.children(&["domain", "resources", "requests", RESOURCE_CPU]));
    }
    if resources.limits.contains_key(RESOURCE_CPU) {
        conflicts.push(field.children(&["domain", "resources", "limits", RESOURCE_CPU]));
    }

    let Some(cpu) = spec.domain.cpu.as_ref() else {
        return conflicts;
    };
    let wanted = &instancetype.cpu;
    let cpu_field = field.children(&["domain", "cpu"]);

    if cpu.sockets != 0 {
        conflicts.push(cpu_field.child("sockets"));
    }
    if cpu.cores != 0 {
        conflicts.push(cpu_field.child("cores"));
    }
    if cpu.threads != 0 {
        conflicts.push(cpu_field.child("threads"));
    }
    if !cpu.model.is_empty() && wanted.model.is_some() {
        conflicts.push(cpu_field.child("model"));
    }
    if cpu.dedicated_cpu_placement && wanted.dedicated_cpu_placement.is_some() {
        conflicts.push(cpu_field.child("dedicatedCPUPlacement"));
    }
    if cpu.isolate_emulator_thread && wanted.isolate_emulator_thread.is_some() {
        conflicts.push(cpu_field.child("isolateEmulatorThread"));
    }
    if cpu.numa.is_some() && wanted.numa.is_some() {
        conflicts.push(cpu_field.child("numa"));
    }
    if cpu.realtime.is_some() && wanted.realtime.is_some() {
        conflicts.push(cpu_field.child("realtime"));
    }
    conflicts
}
