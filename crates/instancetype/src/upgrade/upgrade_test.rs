use super::*;
use crate::revision::build_revision;
use crate::template::InstancetypeTemplate;
use crate::test_fixtures::*;
use crds::{ControllerRevisionUpgradeSpec, TemplateMatcher, revision_labels};
use instancetype_client::{MockInstancetypeClient, RecordedAction};
use k8s_openapi::api::apps::v1::ControllerRevision;
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;

const LEGACY_NAME: &str = "vm-u1.medium-v1alpha2-u1.medium-uid-1";
const UPGRADED_NAME: &str = "vm-u1.medium-v1beta1-u1.medium-uid-1";

struct FailingUpgrader;

#[async_trait::async_trait]
impl RevisionUpgrader for FailingUpgrader {
    async fn upgrade(&self, revision: &ControllerRevision) -> Result<ControllerRevision, InstancetypeError> {
        Err(InstancetypeError::Upgrade {
            name: revision.metadata.name.clone().unwrap_or_default(),
            reason: "boom".to_string(),
        })
    }
}

fn legacy_revision() -> ControllerRevision {
    let template = InstancetypeTemplate::from(cluster_instancetype("u1.medium", 1, instancetype_spec(1, "4Gi")));
    let mut revision = build_revision(&vm(), &template).unwrap();
    revision.metadata.name = Some(LEGACY_NAME.to_string());
    if let Some(labels) = revision.metadata.labels.as_mut() {
        labels.insert(revision_labels::OBJECT_VERSION.to_string(), "v1alpha2".to_string());
    }
    let mut data = revision.data.take().unwrap().0;
    data["apiVersion"] = "instancetype.kubevirt.io/v1alpha2".into();
    revision.data = Some(RawExtension(data));
    revision
}

fn upgrade_request(name: &str, target: &str, phase: Option<UpgradePhase>) -> ControllerRevisionUpgrade {
    let mut upgrade = ControllerRevisionUpgrade::new(
        name,
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

/// Mock holding a VM pinned to a legacy instancetype revision.
fn pinned_setup() -> (Arc<MockInstancetypeClient>, Arc<dyn InstancetypeClientTrait>) {
    let (mock, client) = client();
    let mut vm = with_instancetype(vm(), "u1.medium", "");
    if let Some(matcher) = vm.spec.instancetype.as_mut() {
        matcher.revision_name = Some(LEGACY_NAME.to_string());
    }
    mock.add_virtual_machine(vm);
    mock.add_controller_revision(legacy_revision());
    (mock, client)
}

fn reconciler(client: Arc<dyn InstancetypeClientTrait>) -> UpgradeReconciler {
    UpgradeReconciler::new(client.clone(), Arc::new(SchemaUpgrader::new(client)))
}

fn phase_of(mock: &MockInstancetypeClient, name: &str) -> UpgradePhase {
    mock.revision_upgrade(NAMESPACE, name).unwrap().phase()
}

#[tokio::test]
async fn test_missing_request_is_not_found() {
    let (_, client) = client();
    let err = reconciler(client).reconcile(NAMESPACE, "missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_first_observation_only_claims_the_request() {
    let (mock, client) = pinned_setup();
    mock.add_revision_upgrade(upgrade_request("upgrade", LEGACY_NAME, None));

    let requeue = reconciler(client).reconcile(NAMESPACE, "upgrade").await.unwrap();

    assert!(!requeue);
    assert_eq!(phase_of(&mock, "upgrade"), UpgradePhase::InProgress);
    assert!(mock.revision_upgrade(NAMESPACE, "upgrade").unwrap().status.unwrap().last_transition_time.is_some());
    assert_eq!(mock.controller_revision_names(), vec![LEGACY_NAME.to_string()]);
}

#[tokio::test]
async fn test_legacy_revision_is_migrated_and_repinned() {
    let (mock, client) = pinned_setup();
    mock.add_revision_upgrade(upgrade_request("upgrade", LEGACY_NAME, None));
    let reconciler = reconciler(client);

    assert!(!reconciler.reconcile(NAMESPACE, "upgrade").await.unwrap());
    assert!(!reconciler.reconcile(NAMESPACE, "upgrade").await.unwrap());

    let upgrade = mock.revision_upgrade(NAMESPACE, "upgrade").unwrap();
    assert_eq!(upgrade.phase(), UpgradePhase::Succeeded);
    assert_eq!(upgrade.status.unwrap().result.as_deref(), Some(UPGRADED_NAME));
    assert_eq!(mock.controller_revision_names(), vec![UPGRADED_NAME.to_string()]);

    let vm = mock.virtual_machine(NAMESPACE, VM_NAME).unwrap();
    assert_eq!(vm.spec.instancetype.unwrap().revision_name(), Some(UPGRADED_NAME));

    let migrated = mock.controller_revision(NAMESPACE, UPGRADED_NAME).unwrap();
    let data = migrated.data.unwrap().0;
    assert_eq!(data["apiVersion"], "instancetype.kubevirt.io/v1beta1");
    assert_eq!(data["spec"]["memory"]["guest"], "4Gi");
}

#[tokio::test]
async fn test_succeeded_request_is_left_alone() {
    let (mock, client) = pinned_setup();
    mock.add_revision_upgrade(upgrade_request("upgrade", LEGACY_NAME, Some(UpgradePhase::Succeeded)));

    let requeue = reconciler(client).reconcile(NAMESPACE, "upgrade").await.unwrap();

    assert!(!requeue);
    assert!(mock.actions().is_empty());
}

#[tokio::test]
async fn test_missing_target_fails_and_requeues() {
    let (mock, client) = client();
    mock.add_revision_upgrade(upgrade_request("upgrade", "does-not-exist", Some(UpgradePhase::InProgress)));
    let reconciler = reconciler(client);

    let requeue = reconciler.reconcile(NAMESPACE, "upgrade").await.unwrap();

    assert!(requeue);
    let status = mock.revision_upgrade(NAMESPACE, "upgrade").unwrap().status.unwrap();
    assert_eq!(status.phase, Some(UpgradePhase::Failed));
    assert!(status.message.unwrap().contains("does-not-exist"));

    mock.clear_actions();
    assert!(!reconciler.reconcile(NAMESPACE, "upgrade").await.unwrap());
    assert!(mock.actions().is_empty());
}

#[tokio::test]
async fn test_upgrader_error_fails_and_requeues() {
    let (mock, client) = pinned_setup();
    mock.add_revision_upgrade(upgrade_request("upgrade", LEGACY_NAME, Some(UpgradePhase::InProgress)));
    let reconciler = UpgradeReconciler::new(client, Arc::new(FailingUpgrader));

    let requeue = reconciler.reconcile(NAMESPACE, "upgrade").await.unwrap();

    assert!(requeue);
    let status = mock.revision_upgrade(NAMESPACE, "upgrade").unwrap().status.unwrap();
    assert_eq!(status.phase, Some(UpgradePhase::Failed));
    assert_eq!(status.message.as_deref(), Some("failed to upgrade ControllerRevision vm-u1.medium-v1alpha2-u1.medium-uid-1: boom"));
    assert_eq!(mock.controller_revision_names(), vec![LEGACY_NAME.to_string()]);
}

#[tokio::test]
async fn test_latest_revision_upgrade_is_a_no_op() {
    let (mock, client) = client();
    let template = InstancetypeTemplate::from(cluster_instancetype("u1.medium", 1, instancetype_spec(1, "4Gi")));
    mock.add_controller_revision(build_revision(&vm(), &template).unwrap());
    mock.add_revision_upgrade(upgrade_request("upgrade", UPGRADED_NAME, Some(UpgradePhase::InProgress)));

    let requeue = reconciler(client).reconcile(NAMESPACE, "upgrade").await.unwrap();

    assert!(!requeue);
    let status = mock.revision_upgrade(NAMESPACE, "upgrade").unwrap().status.unwrap();
    assert_eq!(status.phase, Some(UpgradePhase::Succeeded));
    assert_eq!(status.result.as_deref(), Some(UPGRADED_NAME));
    assert!(
        !mock
            .actions()
            .iter()
            .any(|action| matches!(action, RecordedAction::DeleteRevision { .. } | RecordedAction::CreateRevision { .. }))
    );
}

#[tokio::test]
async fn test_orphaned_revision_cannot_be_upgraded() {
    let (mock, client) = client();
    let mut revision = legacy_revision();
    revision.metadata.owner_references = None;
    mock.add_controller_revision(revision);
    mock.add_revision_upgrade(upgrade_request("upgrade", LEGACY_NAME, Some(UpgradePhase::InProgress)));

    let requeue = reconciler(client).reconcile(NAMESPACE, "upgrade").await.unwrap();

    assert!(requeue);
    assert_eq!(phase_of(&mock, "upgrade"), UpgradePhase::Failed);
}
