//! VirtualMachineInstancetype CRDs
//!
//! An instance type is a reusable, mandatory resource shape. Values it sets
//! must not already be present on a virtual machine; any overlap is reported
//! as a conflict when the instance type is applied.

use crate::quantity::Quantity;
use crate::virtual_machine::{Gpu, HostDevice, Hugepages, LaunchSecurity, Numa, Realtime};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineInstancetype",
    namespaced,
    shortname = "vminstancetype"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstancetypeSpec {
    /// Node labels the instance must be scheduled onto
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Scheduler responsible for placing the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_name: Option<String>,

    /// Guest CPU shape
    pub cpu: CpuInstancetype,

    /// Guest memory shape
    pub memory: MemoryInstancetype,

    /// GPUs attached to every instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpus: Vec<Gpu>,

    /// Host devices attached to every instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_devices: Vec<HostDevice>,

    /// IO threads policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_threads_policy: Option<String>,

    /// Confidential computing settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_security: Option<LaunchSecurity>,

    /// Annotations copied onto the instance when absent there
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CpuInstancetype {
    /// Number of vCPUs exposed to the guest
    pub guest: u32,

    /// CPU model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Pin vCPUs to dedicated host CPUs
    #[serde(
        rename = "dedicatedCPUPlacement",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dedicated_cpu_placement: Option<bool>,

    /// Guest NUMA topology
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa: Option<Numa>,

    /// Run the emulator thread on its own host CPU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolate_emulator_thread: Option<bool>,

    /// Realtime tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<Realtime>,

    /// Upper bound of sockets for CPU hotplug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sockets: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInstancetype {
    /// Memory visible to the guest
    pub guest: Quantity,

    /// Back guest memory with hugepages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<Hugepages>,

    /// Percentage (0 to 100) by which the pod memory request undercuts the guest memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0, max = 100))]
    pub overcommit_percent: Option<u8>,

    /// Upper bound of guest memory for memory hotplug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_guest: Option<Quantity>,
}

/// Spec of a cluster-wide instance type.
///
/// Same schema as the namespaced variant.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineClusterInstancetype",
    shortname = "vmclusterinstancetype"
)]
#[serde(transparent)]
pub struct ClusterInstancetypeSpec(pub VirtualMachineInstancetypeSpec);

impl Deref for ClusterInstancetypeSpec {
    type Target = VirtualMachineInstancetypeSpec;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ClusterInstancetypeSpec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<VirtualMachineInstancetypeSpec> for ClusterInstancetypeSpec {
    fn from(spec: VirtualMachineInstancetypeSpec) -> Self {
        Self(spec)
    }
}

impl From<ClusterInstancetypeSpec> for VirtualMachineInstancetypeSpec {
    fn from(spec: ClusterInstancetypeSpec) -> Self {
        spec.0
    }
}
