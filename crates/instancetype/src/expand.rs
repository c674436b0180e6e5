//! Expanded view of a virtual machine
//!
//! Produces the virtual machine as it would run: its templates applied and
//! the matchers removed. The stored object is left alone.

use crate::apply::apply_to_vm;
use crate::error::InstancetypeError;
use crate::find::TemplateResolver;
use crds::VirtualMachine;

/// Returns a copy of `vm` with its instance type and preference applied.
pub async fn expand_virtual_machine(
    resolver: &TemplateResolver,
    vm: &VirtualMachine,
) -> Result<VirtualMachine, InstancetypeError> {
    let instancetype = resolver.resolve_instancetype_spec(vm).await?;
    let preference = resolver.resolve_preference_spec(vm).await?;

    let mut expanded = vm.clone();
    apply_to_vm(&mut expanded, instancetype.as_ref(), preference.as_ref())?;
    expanded.spec.instancetype = None;
    expanded.spec.preference = None;
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find::TemplateCaches;
    use crate::test_fixtures::*;

    #[tokio::test]
    async fn test_expanded_vm_carries_templates_without_matchers() {
        let (mock, client) = client();
        mock.add_cluster_instancetype(cluster_instancetype("u1.medium", 1, instancetype_spec(2, "4Gi")));
        mock.add_cluster_preference(cluster_preference("fedora", 1, preference_spec("q35")));
        let vm = with_preference(with_instancetype(vm(), "u1.medium", ""), "fedora", "");
        let resolver = TemplateResolver::new(client, TemplateCaches::default());

        let expanded = expand_virtual_machine(&resolver, &vm).await.unwrap();

        assert!(expanded.spec.instancetype.is_none());
        assert!(expanded.spec.preference.is_none());
        let domain = &expanded.spec.template.spec.domain;
        assert_eq!(domain.cpu.as_ref().unwrap().sockets, 2);
        assert_eq!(domain.memory.as_ref().unwrap().guest.as_ref().unwrap().as_str(), "4Gi");
        assert_eq!(domain.machine.as_ref().unwrap().machine_type, "q35");
        assert!(mock.actions().is_empty());
    }
}
