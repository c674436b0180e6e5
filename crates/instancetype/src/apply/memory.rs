use super::conflicts::{Conflicts, FieldPath};
use crds::{Memory, Quantity, VirtualMachineInstanceSpec, VirtualMachineInstancetypeSpec};
use tracing::warn;

const RESOURCE_MEMORY: &str = "memory";

/// Applies guest memory, and the reduced pod request when overcommit is set.
///
/// Only the first of `domain.memory`, the memory request and the memory
/// limit found on the target is reported.
pub(crate) fn apply_memory(
    field: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let domain = &mut spec.domain;
    if domain.memory.is_some() {
        return field.children(&["domain", "memory"]).into();
    }
    if domain.resources.requests.contains_key(RESOURCE_MEMORY) {
        return field.children(&["domain", "resources", "requests", RESOURCE_MEMORY]).into();
    }
    if domain.resources.limits.contains_key(RESOURCE_MEMORY) {
        return field.children(&["domain", "resources", "limits", RESOURCE_MEMORY]).into();
    }

    let wanted = &instancetype.memory;
    domain.memory = Some(Memory {
        guest: Some(wanted.guest.clone()),
        hugepages: wanted.hugepages.clone(),
        max_guest: wanted.max_guest.clone(),
    });

    if let Some(percent) = wanted.overcommit_percent.filter(|percent| *percent > 0) {
        match overcommitted_request(&wanted.guest, percent) {
            Some(request) => {
                domain.resources.requests.insert(RESOURCE_MEMORY.to_string(), request);
            }
            None => warn!(
                "Ignoring memory overcommit of {}%: guest memory {} is not a valid quantity",
                percent, wanted.guest
            ),
        }
    }

    Conflicts::new()
}

/// `guest * (1 - percent / 100)`, truncated, in the unit style of `guest`.
fn overcommitted_request(guest: &Quantity, percent: u8) -> Option<Quantity> {
    let guest_bytes = i128::from(guest.value().ok()?);
    let remaining = 100 - i128::from(percent.min(100));
    let request = i64::try_from(guest_bytes * remaining / 100).ok()?;
    Some(Quantity::from_value(request, guest.format()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overcommitted_request_truncates() {
        let request = overcommitted_request(&Quantity::from("2Gi"), 10).unwrap();
        assert_eq!(request.as_str(), "1932735283");
        let request = overcommitted_request(&Quantity::from("2Gi"), 50).unwrap();
        assert_eq!(request.as_str(), "1Gi");
        assert!(overcommitted_request(&Quantity::from("plenty"), 10).is_none());
    }
}
