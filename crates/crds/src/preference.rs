//! VirtualMachinePreference CRDs
//!
//! Preferences are soft defaults. Every preferred value is only written when
//! the virtual machine leaves the corresponding field unset, so preferences
//! never produce conflicts.

use crate::virtual_machine::{ClockOffset, CpuFeature, Efi, FeatureState, InterfaceMasquerade, Timer};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Ratio used by the spread topology when none is given.
pub const DEFAULT_SPREAD_RATIO: u32 = 2;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachinePreference",
    namespaced,
    shortname = "vmpref"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachinePreferenceSpec {
    /// Clock preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<ClockPreferences>,

    /// CPU preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuPreferences>,

    /// Device preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<DevicePreferences>,

    /// Hypervisor feature preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeaturePreferences>,

    /// Firmware preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<FirmwarePreferences>,

    /// Machine preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<MachinePreferences>,

    /// DNS subdomain used when the instance has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_subdomain: Option<String>,

    /// Termination grace period used when the instance has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_termination_grace_period_seconds: Option<i64>,

    /// Deprecated: use `cpu.spreadOptions.ratio`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_spread_socket_to_core_ratio: Option<u32>,

    /// Annotations copied onto the instance when absent there
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl VirtualMachinePreferenceSpec {
    /// Topology strategy the instance type's vCPUs are laid out with.
    ///
    /// Defaults to [`PreferredCpuTopology::Sockets`].
    #[must_use]
    pub fn preferred_topology(&self) -> PreferredCpuTopology {
        self.cpu
            .as_ref()
            .and_then(|cpu| cpu.preferred_cpu_topology)
            .unwrap_or_default()
    }

    /// Ratio and axes of the spread topology.
    ///
    /// The ratio is taken from `cpu.spreadOptions`, then from the deprecated
    /// top-level field, then defaults to 2. A ratio of zero counts as unset.
    #[must_use]
    pub fn spread_options(&self) -> (u32, SpreadAcross) {
        let options = self.cpu.as_ref().and_then(|cpu| cpu.spread_options.as_ref());
        let ratio = options
            .and_then(|options| options.ratio)
            .or(self.prefer_spread_socket_to_core_ratio)
            .filter(|ratio| *ratio > 0)
            .unwrap_or(DEFAULT_SPREAD_RATIO);
        let across = options.and_then(|options| options.across).unwrap_or_default();
        (ratio, across)
    }
}

/// Layout of vCPUs across sockets, cores and threads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum PreferredCpuTopology {
    /// Every vCPU is a socket
    #[default]
    #[serde(alias = "preferSockets")]
    Sockets,
    /// Every vCPU is a core of a single socket
    #[serde(alias = "preferCores")]
    Cores,
    /// Every vCPU is a thread of a single core
    #[serde(alias = "preferThreads")]
    Threads,
    /// vCPUs are spread across axes by a ratio
    #[serde(alias = "preferSpread")]
    Spread,
    /// No preference (laid out as sockets)
    #[serde(alias = "preferAny")]
    Any,
}

/// Axes the spread topology distributes vCPUs over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
pub enum SpreadAcross {
    /// Sockets, cores and two threads per core
    SocketsCoresThreads,
    /// Sockets and cores
    #[default]
    SocketsCores,
    /// Cores and threads
    CoresThreads,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClockPreferences {
    /// Clock offset used when the instance has no clock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_clock_offset: Option<ClockOffset>,

    /// Timers used when the instance has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_timer: Option<Timer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CpuPreferences {
    /// Topology strategy
    #[serde(
        rename = "preferredCPUTopology",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub preferred_cpu_topology: Option<PreferredCpuTopology>,

    /// Options of the spread topology
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_options: Option<SpreadOptions>,

    /// CPU features added when not already listed
    #[serde(
        rename = "preferredCPUFeatures",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub preferred_cpu_features: Vec<CpuFeature>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpreadOptions {
    /// vCPUs per unit of the first axis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<u32>,

    /// Axes to spread across
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub across: Option<SpreadAcross>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DevicePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_graphics_device: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_memory_balloon: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_pod_interface: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_serial_console: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_input_device: Option<bool>,

    /// Bus for disks that do not name one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preferred_disk_bus: String,

    /// Bus for CD-ROMs that do not name one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preferred_cdrom_bus: String,

    /// NIC model for interfaces that do not name one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preferred_interface_model: String,

    /// Masquerade binding for pod network interfaces without a binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_interface_masquerade: Option<InterfaceMasquerade>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_acpi: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_smm: Option<FeatureState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FirmwarePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_use_bios: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_use_bios_serial: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_use_efi: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_use_secure_boot: Option<bool>,

    /// Full EFI configuration; takes precedence over `preferredUseEfi`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_efi: Option<Efi>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachinePreferences {
    /// Machine type used when the instance has none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preferred_machine_type: String,
}

/// Spec of a cluster-wide preference.
///
/// Same schema as the namespaced variant.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineClusterPreference",
    shortname = "vmcpref"
)]
#[serde(transparent)]
pub struct ClusterPreferenceSpec(pub VirtualMachinePreferenceSpec);

impl Deref for ClusterPreferenceSpec {
    type Target = VirtualMachinePreferenceSpec;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ClusterPreferenceSpec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<VirtualMachinePreferenceSpec> for ClusterPreferenceSpec {
    fn from(spec: VirtualMachinePreferenceSpec) -> Self {
        Self(spec)
    }
}

impl From<ClusterPreferenceSpec> for VirtualMachinePreferenceSpec {
    fn from(spec: ClusterPreferenceSpec) -> Self {
        spec.0
    }
}
