use super::*;
use crate::error::InstancetypeError;
use crate::template::{InstancetypeTemplate, PreferenceTemplate};
use crate::test_fixtures::*;
use crds::{LATEST_VERSION, Memory, Quantity, TemplateFamily, revision_labels};
use instancetype_client::{PatchOperation, RecordedAction};
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;

fn medium() -> InstancetypeTemplate {
    InstancetypeTemplate::from(cluster_instancetype("u1.medium", 1, instancetype_spec(1, "4Gi")))
}

fn fedora() -> PreferenceTemplate {
    PreferenceTemplate::from(cluster_preference("fedora", 3, preference_spec("q35")))
}

#[test]
fn test_revision_name_is_deterministic() {
    assert_eq!(
        revision_name("vm", "u1.medium", LATEST_VERSION, "uid", 7),
        "vm-u1.medium-v1beta1-uid-7"
    );
}

#[test]
fn test_build_revision_labels_and_owner() {
    let revision = build_revision(&vm(), &medium()).unwrap();

    assert_eq!(
        revision.metadata.name.as_deref(),
        Some("vm-u1.medium-v1beta1-u1.medium-uid-1")
    );
    assert_eq!(revision.metadata.namespace.as_deref(), Some(NAMESPACE));
    let labels = revision.metadata.labels.as_ref().unwrap();
    assert_eq!(labels[revision_labels::OBJECT_KIND], "VirtualMachineClusterInstancetype");
    assert_eq!(labels[revision_labels::OBJECT_NAME], "u1.medium");
    assert_eq!(labels[revision_labels::OBJECT_UID], "u1.medium-uid");
    assert_eq!(labels[revision_labels::OBJECT_GENERATION], "1");
    assert_eq!(labels[revision_labels::OBJECT_VERSION], LATEST_VERSION);

    let owner = &revision.metadata.owner_references.as_ref().unwrap()[0];
    assert_eq!(owner.kind, "VirtualMachine");
    assert_eq!(owner.api_version, "kubevirt.io/v1");
    assert_eq!(owner.uid, VM_UID);
    assert_eq!(owner.controller, Some(true));

    let data = &revision.data.as_ref().unwrap().0;
    assert_eq!(data["kind"], "VirtualMachineClusterInstancetype");
    assert_eq!(data["spec"]["memory"]["guest"], "4Gi");
}

#[test]
fn test_build_revision_requires_vm_uid() {
    let mut vm = vm();
    vm.metadata.uid = None;
    assert!(matches!(
        build_revision(&vm, &medium()),
        Err(InstancetypeError::InvalidObject(_))
    ));
}

#[test]
fn test_compare_ignores_schema_version_and_metadata() {
    let current = build_revision(&vm(), &medium()).unwrap();
    let mut legacy = current.clone();
    let mut data = legacy.data.take().unwrap().0;
    data["apiVersion"] = "instancetype.kubevirt.io/v1alpha2".into();
    data["metadata"]["name"] = "renamed".into();
    legacy.data = Some(RawExtension(data));

    assert!(compare(&current, &legacy).unwrap());
    let other = build_revision(&vm(), &fedora()).unwrap();
    assert!(!compare(&current, &other).unwrap());
}

#[tokio::test]
async fn test_store_once_is_idempotent() {
    let (mock, client) = client();
    let store = RevisionStore::new(client);

    let first = store.store_once(&vm(), &medium()).await.unwrap();
    let second = store.store_once(&vm(), &medium()).await.unwrap();

    assert_eq!(first.metadata.name, second.metadata.name);
    assert_eq!(first.metadata.uid, second.metadata.uid);
    assert_eq!(mock.controller_revision_names(), vec!["vm-u1.medium-v1beta1-u1.medium-uid-1".to_string()]);
}

#[tokio::test]
async fn test_store_once_rejects_different_content_under_same_name() {
    let (mock, client) = client();
    let store = RevisionStore::new(client);
    let stored = store.store_once(&vm(), &medium()).await.unwrap();

    let mut changed = medium();
    changed.spec.cpu.guest = 4;
    let err = store.store_once(&vm(), &changed).await.unwrap_err();

    assert!(matches!(err, InstancetypeError::RevisionMismatch(_)));
    assert!(!err.is_retryable());
    let kept = mock.controller_revision(NAMESPACE, &stored.metadata.name.clone().unwrap()).unwrap();
    assert_eq!(kept.data, stored.data);
}

#[tokio::test]
async fn test_store_pins_both_matchers_in_one_patch() {
    let (mock, client) = client();
    let vm = with_preference(with_instancetype(vm(), "u1.medium", ""), "fedora", "");
    mock.add_virtual_machine(vm.clone());
    let store = RevisionStore::new(client);

    store.store(&vm, Some(&medium()), Some(&fedora())).await.unwrap();

    let patches: Vec<_> = mock
        .actions()
        .into_iter()
        .filter_map(|action| match action {
            RecordedAction::PatchVirtualMachine { operations, .. } => Some(operations),
            _ => None,
        })
        .collect();
    assert_eq!(patches.len(), 1);
    let operations = &patches[0];
    assert_eq!(operations.len(), 4);
    assert!(matches!(&operations[0], PatchOperation::Test { path, value } if path == "/spec/instancetype/revisionName" && value.is_null()));
    assert!(matches!(&operations[1], PatchOperation::Add { path, .. } if path == "/spec/instancetype/revisionName"));
    assert!(matches!(&operations[3], PatchOperation::Add { path, .. } if path == "/spec/preference/revisionName"));

    let pinned = mock.virtual_machine(NAMESPACE, VM_NAME).unwrap();
    assert_eq!(
        pinned.spec.instancetype.unwrap().revision_name.as_deref(),
        Some("vm-u1.medium-v1beta1-u1.medium-uid-1")
    );
    assert_eq!(
        pinned.spec.preference.unwrap().revision_name.as_deref(),
        Some("vm-fedora-v1beta1-fedora-uid-3")
    );
}

#[tokio::test]
async fn test_store_skips_pinned_matchers() {
    let (mock, client) = client();
    let mut vm = with_instancetype(vm(), "u1.medium", "");
    if let Some(matcher) = vm.spec.instancetype.as_mut() {
        matcher.revision_name = Some("already-pinned".to_string());
    }
    mock.add_virtual_machine(vm.clone());
    let store = RevisionStore::new(client);

    store.store(&vm, Some(&medium()), None).await.unwrap();

    assert!(mock.actions().is_empty());
}

#[tokio::test]
async fn test_store_rechecks_instancetype_conflicts() {
    let (mock, client) = client();
    let mut vm = with_instancetype(vm(), "u1.medium", "");
    vm.spec.template.spec.domain.memory = Some(Memory {
        guest: Some(Quantity::from("1Gi")),
        ..Memory::default()
    });
    mock.add_virtual_machine(vm.clone());
    let store = RevisionStore::new(client);

    let err = store.store(&vm, Some(&medium()), None).await.unwrap_err();

    assert!(matches!(err, InstancetypeError::Conflicts(_)));
    assert!(mock.controller_revision_names().is_empty());
}

#[tokio::test]
async fn test_losing_pin_race_is_a_retryable_conflict() {
    let (mock, client) = client();
    let local = with_instancetype(vm(), "u1.medium", "");
    let mut remote = local.clone();
    if let Some(matcher) = remote.spec.instancetype.as_mut() {
        matcher.revision_name = Some("pinned-by-someone-else".to_string());
    }
    mock.add_virtual_machine(remote);
    let store = RevisionStore::new(client);

    let err = store.store(&local, Some(&medium()), None).await.unwrap_err();

    assert!(matches!(&err, InstancetypeError::Client(client) if client.is_conflict()));
    assert!(err.is_retryable());
    let remote = mock.virtual_machine(NAMESPACE, VM_NAME).unwrap();
    assert_eq!(
        remote.spec.instancetype.unwrap().revision_name.as_deref(),
        Some("pinned-by-someone-else")
    );
}

#[test]
fn test_repin_tests_the_old_name() {
    let [test, replace] = repin_operations(TemplateFamily::Preference, "old", "new");
    assert_eq!(
        test,
        PatchOperation::Test {
            path: "/spec/preference/revisionName".to_string(),
            value: "old".into(),
        }
    );
    assert_eq!(
        replace,
        PatchOperation::Replace {
            path: "/spec/preference/revisionName".to_string(),
            value: "new".into(),
        }
    );
}
