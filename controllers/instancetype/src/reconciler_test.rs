use super::*;
use crds::{
    ClusterInstancetypeSpec, ControllerRevisionUpgradeSpec, ControllerRevisionUpgradeStatus, CpuInstancetype,
    InstancetypeMatcher, MemoryInstancetype, Quantity, UpgradePhase, VirtualMachineClusterInstancetype,
    VirtualMachineInstancetypeSpec, VirtualMachineSpec,
};
use instancetype::InstancetypeTemplate;
use instancetype::revision::build_revision;
use instancetype_client::{MockInstancetypeClient, RecordedAction};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::time::Duration;

const NAMESPACE: &str = "default";

fn instancetype(guest_cpus: u32) -> VirtualMachineClusterInstancetype {
    VirtualMachineClusterInstancetype {
        metadata: ObjectMeta {
            name: Some("small".to_string()),
            uid: Some("small-uid".to_string()),
            generation: Some(1),
            ..ObjectMeta::default()
        },
        spec: ClusterInstancetypeSpec(VirtualMachineInstancetypeSpec {
            cpu: CpuInstancetype {
                guest: guest_cpus,
                ..CpuInstancetype::default()
            },
            memory: MemoryInstancetype {
                guest: Quantity::from("1Gi"),
                ..MemoryInstancetype::default()
            },
            ..VirtualMachineInstancetypeSpec::default()
        }),
    }
}

fn vm(instancetype: Option<&str>) -> VirtualMachine {
    VirtualMachine {
        metadata: ObjectMeta {
            name: Some("vm".to_string()),
            namespace: Some(NAMESPACE.to_string()),
            uid: Some("vm-uid".to_string()),
            generation: Some(1),
            ..ObjectMeta::default()
        },
        spec: VirtualMachineSpec {
            instancetype: instancetype.map(|name| InstancetypeMatcher {
                name: name.to_string(),
                kind: None,
                revision_name: None,
            }),
            ..VirtualMachineSpec::default()
        },
    }
}

fn upgrade_request(target: &str, phase: Option<UpgradePhase>) -> ControllerRevisionUpgrade {
    let mut upgrade = ControllerRevisionUpgrade::new(
        "upgrade",
        ControllerRevisionUpgradeSpec {
            target_name: target.to_string(),
        },
    );
    upgrade.metadata.namespace = Some(NAMESPACE.to_string());
    upgrade.status = phase.map(|phase| ControllerRevisionUpgradeStatus {
        phase: Some(phase),
        ..ControllerRevisionUpgradeStatus::default()
    });
    upgrade
}

fn setup(config: &ControllerConfig) -> (Arc<MockInstancetypeClient>, Reconciler) {
    let mock = Arc::new(MockInstancetypeClient::new());
    let client: Arc<dyn InstancetypeClientTrait> = mock.clone();
    let reconciler = Reconciler::new(client, TemplateCaches::default(), config);
    (mock, reconciler)
}

#[tokio::test]
async fn test_vm_without_templates_waits_for_changes() {
    let (mock, reconciler) = setup(&ControllerConfig::default());

    let action = reconciler.reconcile_virtual_machine(&vm(None)).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert!(mock.actions().is_empty());
}

#[tokio::test]
async fn test_vm_is_pinned_to_a_new_revision() {
    let (mock, reconciler) = setup(&ControllerConfig::default());
    mock.add_cluster_instancetype(instancetype(2));
    mock.add_virtual_machine(vm(Some("small")));

    let action = reconciler.reconcile_virtual_machine(&vm(Some("small"))).await.unwrap();
    assert_eq!(action, Action::await_change());

    let revisions = mock.controller_revision_names();
    assert_eq!(revisions.len(), 1);
    let pinned = mock.virtual_machine(NAMESPACE, "vm").unwrap();
    assert_eq!(
        pinned.spec.instancetype.and_then(|matcher| matcher.revision_name),
        Some(revisions[0].clone())
    );
}

#[tokio::test]
async fn test_deleted_vm_is_skipped() {
    let (mock, reconciler) = setup(&ControllerConfig::default());
    let mut deleted = vm(Some("missing"));
    deleted.metadata.deletion_timestamp =
        serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap();

    let action = reconciler.reconcile_virtual_machine(&deleted).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert!(mock.actions().is_empty());
}

#[tokio::test]
async fn test_missing_instancetype_is_requeued_with_growing_delay() {
    let (_mock, reconciler) = setup(&ControllerConfig::default());
    let key = requeue_key(VIRTUAL_MACHINE, Some(NAMESPACE), "vm");

    let error = reconciler.reconcile_virtual_machine(&vm(Some("missing"))).await.unwrap_err();
    assert!(error.is_retryable());
    assert_eq!(reconciler.error_action(&key, &error), Action::requeue(Duration::from_secs(5)));
    assert_eq!(reconciler.error_action(&key, &error), Action::requeue(Duration::from_secs(10)));
    assert_eq!(reconciler.error_action(&key, &error), Action::requeue(Duration::from_secs(20)));
}

#[tokio::test]
async fn test_success_forgets_failures() {
    let (mock, reconciler) = setup(&ControllerConfig::default());
    let key = requeue_key(VIRTUAL_MACHINE, Some(NAMESPACE), "vm");

    let error = reconciler.reconcile_virtual_machine(&vm(Some("small"))).await.unwrap_err();
    reconciler.error_action(&key, &error);
    reconciler.error_action(&key, &error);

    mock.add_cluster_instancetype(instancetype(2));
    mock.add_virtual_machine(vm(Some("small")));
    reconciler.reconcile_virtual_machine(&vm(Some("small"))).await.unwrap();

    assert_eq!(reconciler.error_action(&key, &error), Action::requeue(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_revision_mismatch_is_not_retried() {
    let (mock, reconciler) = setup(&ControllerConfig::default());
    mock.add_cluster_instancetype(instancetype(2));
    mock.add_virtual_machine(vm(Some("small")));
    // Same name, different content
    let stale = build_revision(&vm(Some("small")), &InstancetypeTemplate::from(instancetype(8))).unwrap();
    mock.add_controller_revision(stale);

    let error = reconciler.reconcile_virtual_machine(&vm(Some("small"))).await.unwrap_err();
    assert!(matches!(error, ControllerError::Instancetype(InstancetypeError::RevisionMismatch(_))));

    let key = requeue_key(VIRTUAL_MACHINE, Some(NAMESPACE), "vm");
    assert_eq!(reconciler.error_action(&key, &error), Action::await_change());
    assert!(
        !mock
            .actions()
            .iter()
            .any(|action| matches!(action, RecordedAction::PatchVirtualMachine { .. }))
    );
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let config = ControllerConfig {
        max_retries: 2,
        ..ControllerConfig::default()
    };
    let (_mock, reconciler) = setup(&config);
    let key = requeue_key(VIRTUAL_MACHINE, Some(NAMESPACE), "vm");
    let error = reconciler.reconcile_virtual_machine(&vm(Some("missing"))).await.unwrap_err();

    assert_ne!(reconciler.error_action(&key, &error), Action::await_change());
    assert_ne!(reconciler.error_action(&key, &error), Action::await_change());
    assert_eq!(reconciler.error_action(&key, &error), Action::await_change());
}

#[tokio::test]
async fn test_new_upgrade_request_is_claimed() {
    let (mock, reconciler) = setup(&ControllerConfig::default());
    mock.add_revision_upgrade(upgrade_request("rev", None));

    let action = reconciler.reconcile_upgrade(&upgrade_request("rev", None)).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert_eq!(
        mock.revision_upgrade(NAMESPACE, "upgrade").unwrap().phase(),
        UpgradePhase::InProgress
    );
}

#[tokio::test]
async fn test_failed_upgrade_is_rate_limited() {
    let (mock, reconciler) = setup(&ControllerConfig::default());
    let request = upgrade_request("missing-rev", Some(UpgradePhase::InProgress));
    mock.add_revision_upgrade(request.clone());

    let action = reconciler.reconcile_upgrade(&request).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(5)));
    assert_eq!(mock.revision_upgrade(NAMESPACE, "upgrade").unwrap().phase(), UpgradePhase::Failed);

    // Failed is terminal: the requeued pass settles the key
    let action = reconciler.reconcile_upgrade(&request).await.unwrap();
    assert_eq!(action, Action::await_change());
}

#[tokio::test]
async fn test_missing_upgrade_request_is_retryable() {
    let (_mock, reconciler) = setup(&ControllerConfig::default());

    let error = reconciler.reconcile_upgrade(&upgrade_request("rev", None)).await.unwrap_err();
    assert!(error.is_retryable());
    assert!(matches!(error, ControllerError::Instancetype(ref e) if e.is_not_found()));
}

#[test]
fn test_requeue_keys_separate_resources() {
    assert_eq!(requeue_key(VIRTUAL_MACHINE, Some("ns"), "a"), "VirtualMachine/ns/a");
    assert_ne!(
        requeue_key(VIRTUAL_MACHINE, Some("ns"), "a"),
        requeue_key(REVISION_UPGRADE, Some("ns"), "a")
    );
}
