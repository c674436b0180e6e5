//! Objects shared by the async test suites

use crds::{
    ClusterInstancetypeSpec, ClusterPreferenceSpec, CpuInstancetype, InstancetypeMatcher, MachinePreferences,
    MemoryInstancetype, PreferenceMatcher, Quantity, VirtualMachine, VirtualMachineClusterInstancetype,
    VirtualMachineClusterPreference, VirtualMachineInstancetype, VirtualMachineInstancetypeSpec,
    VirtualMachinePreference, VirtualMachinePreferenceSpec, VirtualMachineSpec,
};
use instancetype_client::{InstancetypeClientTrait, MockInstancetypeClient};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;

pub(crate) const NAMESPACE: &str = "default";
pub(crate) const VM_NAME: &str = "vm";
pub(crate) const VM_UID: &str = "vm-uid";

fn meta(namespace: Option<&str>, name: &str, uid: &str, generation: i64) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        uid: Some(uid.to_string()),
        generation: Some(generation),
        ..ObjectMeta::default()
    }
}

pub(crate) fn instancetype_spec(guest_cpus: u32, guest_memory: &str) -> VirtualMachineInstancetypeSpec {
    VirtualMachineInstancetypeSpec {
        cpu: CpuInstancetype {
            guest: guest_cpus,
            ..CpuInstancetype::default()
        },
        memory: MemoryInstancetype {
            guest: Quantity::from(guest_memory),
            ..MemoryInstancetype::default()
        },
        ..VirtualMachineInstancetypeSpec::default()
    }
}

pub(crate) fn preference_spec(machine_type: &str) -> VirtualMachinePreferenceSpec {
    VirtualMachinePreferenceSpec {
        machine: Some(MachinePreferences {
            preferred_machine_type: machine_type.to_string(),
        }),
        ..VirtualMachinePreferenceSpec::default()
    }
}

pub(crate) fn instancetype(name: &str, generation: i64, spec: VirtualMachineInstancetypeSpec) -> VirtualMachineInstancetype {
    VirtualMachineInstancetype {
        metadata: meta(Some(NAMESPACE), name, &format!("{name}-uid"), generation),
        spec,
    }
}

pub(crate) fn cluster_instancetype(
    name: &str,
    generation: i64,
    spec: VirtualMachineInstancetypeSpec,
) -> VirtualMachineClusterInstancetype {
    VirtualMachineClusterInstancetype {
        metadata: meta(None, name, &format!("{name}-uid"), generation),
        spec: ClusterInstancetypeSpec(spec),
    }
}

pub(crate) fn preference(name: &str, generation: i64, spec: VirtualMachinePreferenceSpec) -> VirtualMachinePreference {
    VirtualMachinePreference {
        metadata: meta(Some(NAMESPACE), name, &format!("{name}-uid"), generation),
        spec,
    }
}

pub(crate) fn cluster_preference(
    name: &str,
    generation: i64,
    spec: VirtualMachinePreferenceSpec,
) -> VirtualMachineClusterPreference {
    VirtualMachineClusterPreference {
        metadata: meta(None, name, &format!("{name}-uid"), generation),
        spec: ClusterPreferenceSpec(spec),
    }
}

pub(crate) fn vm() -> VirtualMachine {
    VirtualMachine {
        metadata: meta(Some(NAMESPACE), VM_NAME, VM_UID, 1),
        spec: VirtualMachineSpec::default(),
    }
}

pub(crate) fn with_instancetype(mut vm: VirtualMachine, name: &str, kind: &str) -> VirtualMachine {
    vm.spec.instancetype = Some(InstancetypeMatcher {
        name: name.to_string(),
        kind: (!kind.is_empty()).then(|| kind.to_string()),
        revision_name: None,
    });
    vm
}

pub(crate) fn with_preference(mut vm: VirtualMachine, name: &str, kind: &str) -> VirtualMachine {
    vm.spec.preference = Some(PreferenceMatcher {
        name: name.to_string(),
        kind: (!kind.is_empty()).then(|| kind.to_string()),
        revision_name: None,
    });
    vm
}

pub(crate) fn client() -> (Arc<MockInstancetypeClient>, Arc<dyn InstancetypeClientTrait>) {
    let mock = Arc::new(MockInstancetypeClient::new());
    let client: Arc<dyn InstancetypeClientTrait> = mock.clone();
    (mock, client)
}
