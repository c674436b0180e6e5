use super::conflicts::Conflicts;
use std::collections::BTreeMap;

/// Copies template annotations onto `target` for keys it does not carry yet.
///
/// Values already present on the target win and are never reported.
pub fn apply_instancetype_annotations(
    annotations: &BTreeMap<String, String>,
    target: &mut BTreeMap<String, String>,
) -> Conflicts {
    for (key, value) in annotations {
        target.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Conflicts::new()
}
