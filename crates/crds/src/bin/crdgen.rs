//! Prints the CRD manifests of this crate as a multi-document YAML stream.
//!
//! `cargo run -p crds --bin crdgen > config/crd/instancetype.yaml`

use anyhow::Result;
use crds::{
    ControllerRevisionUpgrade, VirtualMachineClusterInstancetype, VirtualMachineClusterPreference,
    VirtualMachineInstancetype, VirtualMachinePreference,
};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crds = [
        VirtualMachineInstancetype::crd(),
        VirtualMachineClusterInstancetype::crd(),
        VirtualMachinePreference::crd(),
        VirtualMachineClusterPreference::crd(),
        ControllerRevisionUpgrade::crd(),
    ];

    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
