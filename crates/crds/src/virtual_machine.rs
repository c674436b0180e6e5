//! VirtualMachine CRD
//!
//! The subset of the `kubevirt.io/v1` virtual machine schema that instance
//! types and preferences act upon. Everything the controller does not touch
//! is still preserved through the typed fields below or dropped by the API
//! server's pruning, exactly as with any other structural schema.

use crate::quantity::Quantity;
use crate::references::{InstancetypeMatcher, PreferenceMatcher};
use crate::serde_helpers::{is_false, is_zero};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API group of `VirtualMachine`.
pub const VIRTUAL_MACHINE_GROUP: &str = "kubevirt.io";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachine",
    namespaced,
    shortname = "vm"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    /// Whether the virtual machine should be running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,

    /// Instance type providing the mandatory resource shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instancetype: Option<InstancetypeMatcher>,

    /// Preference providing soft defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<PreferenceMatcher>,

    /// Template of the virtual machine instance
    #[serde(default)]
    pub template: VirtualMachineInstanceTemplateSpec,
}

/// Template of the instance created for a virtual machine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceTemplateSpec {
    /// Labels and annotations propagated to the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,

    /// Instance specification
    #[serde(default)]
    pub spec: VirtualMachineInstanceSpec,
}

/// Object metadata carried inside a template.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    /// Labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    /// Guest domain
    #[serde(default)]
    pub domain: DomainSpec,

    /// Node labels the instance must be scheduled onto
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Scheduler responsible for placing the instance
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheduler_name: String,

    /// DNS subdomain of the instance
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subdomain: String,

    /// Grace period for shutdown in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,

    /// Networks interfaces attach to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    /// Compute resources of the launcher pod
    #[serde(default)]
    pub resources: ResourceRequirements,

    /// Guest CPU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Cpu>,

    /// Guest memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Memory>,

    /// Emulated machine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<Machine>,

    /// Firmware and bootloader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<Firmware>,

    /// Guest clock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<Clock>,

    /// Hypervisor features
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Features>,

    /// Attached devices
    #[serde(default)]
    pub devices: Devices,

    /// IO threads policy (`shared`, `auto`, `supplementalPool`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_threads_policy: Option<String>,

    /// Confidential computing settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_security: Option<LaunchSecurity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, Quantity>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, Quantity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    /// Cores per socket
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cores: u32,

    /// Number of sockets
    #[serde(default, skip_serializing_if = "is_zero")]
    pub sockets: u32,

    /// Threads per core
    #[serde(default, skip_serializing_if = "is_zero")]
    pub threads: u32,

    /// CPU model (`host-passthrough`, `host-model` or a named model)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    /// Pin vCPUs to dedicated host CPUs
    #[serde(rename = "dedicatedCpuPlacement", alias = "dedicatedCPUPlacement", default, skip_serializing_if = "is_false")]
    pub dedicated_cpu_placement: bool,

    /// Run the emulator thread on its own host CPU
    #[serde(default, skip_serializing_if = "is_false")]
    pub isolate_emulator_thread: bool,

    /// Guest NUMA topology
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa: Option<Numa>,

    /// Realtime tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<Realtime>,

    /// Upper bound of sockets for CPU hotplug
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_sockets: u32,

    /// Individually required or disabled CPU features
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<CpuFeature>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Numa {
    /// Mirror the host NUMA layout into the guest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_mapping_passthrough: Option<GuestMappingPassthrough>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct GuestMappingPassthrough {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Realtime {
    /// vCPUs to run with realtime scheduling, e.g. `0-3,^1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CpuFeature {
    /// Feature name, e.g. `pcid`
    pub name: String,

    /// `force`, `require`, `optional`, `disable` or `forbid`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Memory visible to the guest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest: Option<Quantity>,

    /// Back guest memory with hugepages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<Hugepages>,

    /// Upper bound of guest memory for memory hotplug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_guest: Option<Quantity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Hugepages {
    /// Page size, e.g. `2Mi` or `1Gi`
    pub page_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct Machine {
    /// Emulated machine type, e.g. `q35`
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub machine_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Firmware {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootloader: Option<Bootloader>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Bootloader {
    /// Legacy BIOS boot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bios: Option<Bios>,

    /// UEFI boot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efi: Option<Efi>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Bios {
    /// Route BIOS output to the serial console
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_serial: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Efi {
    /// Enforce secure boot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_boot: Option<bool>,

    /// Keep EFI variables across reboots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Clock {
    /// Offset of the guest clock
    #[serde(flatten)]
    pub offset: ClockOffset,

    /// Guest timers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<Timer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClockOffset {
    /// UTC based offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc: Option<ClockOffsetUtc>,

    /// Named timezone, e.g. `Europe/Berlin`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClockOffsetUtc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_seconds: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpet: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kvm: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pit: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtc: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperv: Option<FeatureState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeatureState {
    /// Defaults to enabled when the feature is listed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acpi: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smm: Option<FeatureState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Devices {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<Disk>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpus: Vec<Gpu>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_devices: Vec<HostDevice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_graphics_device: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_memory_balloon: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_pod_interface: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_serial_console: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_input_device: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    /// Name of the volume backing the disk
    pub name: String,

    /// Exposed as a regular disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskTarget>,

    /// Exposed as a CD-ROM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdrom: Option<DiskTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DiskTarget {
    /// Bus, e.g. `virtio`, `sata` or `scsi`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bus: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    /// Name of the network the interface is attached to
    pub name: String,

    /// Emulated NIC model, e.g. `virtio` or `e1000e`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    /// Masquerade (NAT) binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masquerade: Option<InterfaceMasquerade>,

    /// Bridge binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<InterfaceBridge>,

    /// SR-IOV binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sriov: Option<InterfaceSriov>,

    /// Network binding plugin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<PluginBinding>,
}

impl Interface {
    /// Whether no binding method has been chosen for this interface.
    #[must_use]
    pub fn binding_unset(&self) -> bool {
        self.masquerade.is_none() && self.bridge.is_none() && self.sriov.is_none() && self.binding.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct InterfaceMasquerade {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct InterfaceBridge {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct InterfaceSriov {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct PluginBinding {
    /// Name of the binding plugin
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    /// Name referenced by interfaces
    pub name: String,

    /// Default pod network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<PodNetwork>,

    /// Secondary network provided by Multus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multus: Option<MultusNetwork>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodNetwork {
    /// CIDR of the VM-side network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_network_cidr: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MultusNetwork {
    /// `NetworkAttachmentDefinition` reference
    pub network_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Gpu {
    /// Name of the device inside the guest
    pub name: String,

    /// Resource name of the device plugin
    pub device_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HostDevice {
    /// Name of the device inside the guest
    pub name: String,

    /// Resource name of the device plugin
    pub device_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSecurity {
    /// AMD Secure Encrypted Virtualization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sev: Option<Sev>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Sev {
    /// Encrypt the CPU register state (SEV-ES)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_state: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_machine_deserializes_matchers_and_domain() {
        let vm: VirtualMachine = serde_json::from_value(serde_json::json!({
            "apiVersion": "kubevirt.io/v1",
            "kind": "VirtualMachine",
            "metadata": { "name": "db", "namespace": "prod" },
            "spec": {
                "instancetype": { "name": "u1.medium" },
                "preference": { "name": "fedora", "kind": "VirtualMachinePreference" },
                "template": {
                    "spec": {
                        "domain": {
                            "cpu": { "cores": 2, "dedicatedCpuPlacement": true },
                            "machine": { "type": "q35" },
                            "resources": { "requests": { "memory": "1Gi" } }
                        }
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(vm.spec.instancetype.as_ref().unwrap().name, "u1.medium");
        let domain = &vm.spec.template.spec.domain;
        assert_eq!(domain.cpu.as_ref().unwrap().cores, 2);
        assert!(domain.cpu.as_ref().unwrap().dedicated_cpu_placement);
        assert_eq!(domain.machine.as_ref().unwrap().machine_type, "q35");
        assert_eq!(domain.resources.requests["memory"].as_str(), "1Gi");
    }

    #[test]
    fn test_zero_topology_is_omitted() {
        let cpu = Cpu {
            cores: 4,
            ..Cpu::default()
        };
        let value = serde_json::to_value(&cpu).unwrap();
        assert_eq!(value, serde_json::json!({ "cores": 4 }));
    }

    #[test]
    fn test_interface_binding_unset() {
        let mut iface = Interface {
            name: "default".to_string(),
            ..Interface::default()
        };
        assert!(iface.binding_unset());
        iface.bridge = Some(InterfaceBridge {});
        assert!(!iface.binding_unset());
    }
}
