use crate::compatibility::decode;
use crate::error::InstancetypeError;
use k8s_openapi::api::apps::v1::ControllerRevision;

/// Whether two revisions freeze the same template content.
///
/// Both are decoded first, so revisions at different schema versions or with
/// different metadata still compare equal when their specs match.
pub fn compare(a: &ControllerRevision, b: &ControllerRevision) -> Result<bool, InstancetypeError> {
    Ok(decode(a, None)?.same_spec(&decode(b, None)?))
}
