use crds::TemplateFamily;
use instancetype_client::PatchOperation;
use serde_json::Value;

fn revision_name_path(family: TemplateFamily) -> String {
    format!("{}/revisionName", family.matcher_path())
}

/// Pins an unpinned matcher to `revision_name`.
///
/// The `test` makes the patch fail when another writer pinned it first.
#[must_use]
pub fn pin_operations(family: TemplateFamily, revision_name: &str) -> [PatchOperation; 2] {
    let path = revision_name_path(family);
    [
        PatchOperation::Test {
            path: path.clone(),
            value: Value::Null,
        },
        PatchOperation::Add {
            path,
            value: Value::String(revision_name.to_string()),
        },
    ]
}

/// Moves a matcher from revision `from` to revision `to`.
#[must_use]
pub fn repin_operations(family: TemplateFamily, from: &str, to: &str) -> [PatchOperation; 2] {
    let path = revision_name_path(family);
    [
        PatchOperation::Test {
            path: path.clone(),
            value: Value::String(from.to_string()),
        },
        PatchOperation::Replace {
            path,
            value: Value::String(to.to_string()),
        },
    ]
}
