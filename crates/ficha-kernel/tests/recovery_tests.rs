use async_trait::async_trait;
use ficha_kernel::config::KernelConfig;
use ficha_kernel::error::StoreError;
use ficha_kernel::logging::{EventKind, EventSeverity};
use ficha_kernel::persistence::{PersistenceLayer, SaveOutcome, SnapshotStore};
use ficha_kernel::recovery::{Recovery, RecoveryManager};
use ficha_kernel::registry::FichaRegistry;
use ficha_model::{FichaId, FichaState, FichaStatus, RecoverySource};
use ficha_test_utils::{empty_fields_ficha, valid_ficha};
use ficha_validate::FinalValidator;
use mockall::mock;
use std::sync::Arc;

mock! {
    Persistence {}

    #[async_trait]
    impl PersistenceLayer for Persistence {
        async fn last_valid_state(&self, ficha_id: &FichaId) -> Result<Option<FichaState>, StoreError>;
        async fn safe_save(&self, ficha_id: &FichaId, state: &FichaState) -> Result<SaveOutcome, StoreError>;
    }
}

mock! {
    Snapshots {}

    #[async_trait]
    impl SnapshotStore for Snapshots {
        async fn latest_snapshot(&self, ficha_id: &FichaId) -> Result<Option<FichaState>, StoreError>;
        async fn all_snapshots(&self, ficha_id: &FichaId) -> Result<Vec<FichaState>, StoreError>;
    }
}

fn manager(
    persistence: MockPersistence,
    snapshots: MockSnapshots,
) -> (RecoveryManager, Arc<FichaRegistry>) {
    let registry = Arc::new(FichaRegistry::new(KernelConfig::default()));
    let manager = RecoveryManager::new(
        Arc::new(persistence),
        Arc::new(snapshots),
        Arc::new(FinalValidator::default()),
        Arc::clone(&registry),
    );
    (manager, registry)
}

fn with_version(mut state: FichaState, version: u64) -> FichaState {
    state.version = version;
    state
}

#[tokio::test]
async fn test_empty_stores_yield_base_state() {
    let mut persistence = MockPersistence::new();
    persistence
        .expect_last_valid_state()
        .times(1)
        .returning(|_| Ok(None));
    let mut snapshots = MockSnapshots::new();
    snapshots
        .expect_all_snapshots()
        .times(1)
        .returning(|_| Ok(Vec::new()));
    let (manager, registry) = manager(persistence, snapshots);

    let id = FichaId::new("f-empty");
    let result = manager.recover(&id).await;

    assert!(result.success);
    assert_eq!(result.source, RecoverySource::Base);
    assert_eq!(result.state.id, id);
    assert_eq!(result.state.status, FichaStatus::Draft);
    assert!(result.state.sections.is_empty());
    assert!(result.message.contains("reset"));

    let restores = registry.event_log(&id).by_kind(EventKind::Restore);
    assert_eq!(restores.len(), 1);
    assert_eq!(restores[0].severity, EventSeverity::Warning);
}

#[tokio::test]
async fn test_last_valid_state_short_circuits_snapshots() {
    let mut persistence = MockPersistence::new();
    persistence
        .expect_last_valid_state()
        .returning(|id| Ok(Some(with_version(valid_ficha(id.as_str()), 9))));
    let mut snapshots = MockSnapshots::new();
    snapshots.expect_all_snapshots().never();
    let (manager, _) = manager(persistence, snapshots);

    let result = manager.recover(&FichaId::new("f1")).await;
    assert_eq!(result.source, RecoverySource::LastValid);
    assert_eq!(result.state.version, 9);
    assert_eq!(result.message, "recovered from last valid state");
}

#[tokio::test]
async fn test_invalid_last_valid_falls_through_to_first_valid_snapshot() {
    let mut persistence = MockPersistence::new();
    persistence
        .expect_last_valid_state()
        .returning(|id| Ok(Some(FichaState::base(id))));
    let mut snapshots = MockSnapshots::new();
    snapshots.expect_all_snapshots().returning(|id| {
        Ok(vec![
            FichaState::base(id),
            with_version(valid_ficha(id.as_str()), 4),
            with_version(valid_ficha(id.as_str()), 3),
        ])
    });
    let (manager, _) = manager(persistence, snapshots);

    let result = manager.recover(&FichaId::new("f2")).await;
    assert!(result.success);
    assert_eq!(result.source, RecoverySource::Snapshot);
    assert_eq!(result.state.version, 4);
}

#[tokio::test]
async fn test_store_failure_reports_unsuccessful_base() {
    let mut persistence = MockPersistence::new();
    persistence
        .expect_last_valid_state()
        .returning(|_| Err(StoreError::Unavailable("disk gone".into())));
    let mut snapshots = MockSnapshots::new();
    snapshots.expect_all_snapshots().never();
    let (manager, registry) = manager(persistence, snapshots);

    let id = FichaId::new("f3");
    let result = manager.recover(&id).await;
    assert!(!result.success);
    assert_eq!(result.source, RecoverySource::Base);
    assert_eq!(result.state.id, id);
    assert!(result.state.sections.is_empty());
    assert!(result.message.contains("disk gone"));

    let errors = registry.event_log(&id).by_kind(EventKind::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(manager.recovery_log().len(), 1);
}

#[tokio::test]
async fn test_snapshot_failure_after_stale_last_valid() {
    let mut persistence = MockPersistence::new();
    persistence
        .expect_last_valid_state()
        .returning(|id| Ok(Some(empty_fields_ficha(id.as_str()).with_pozo_id(""))));
    let mut snapshots = MockSnapshots::new();
    snapshots
        .expect_all_snapshots()
        .returning(|_| Err(StoreError::Io("read failed".into())));
    let (manager, _) = manager(persistence, snapshots);

    let result = manager.recover(&FichaId::new("f4")).await;
    assert!(!result.success);
    assert_eq!(result.source, RecoverySource::Base);
}

#[tokio::test]
async fn test_validate_and_recover_passes_valid_state_through() {
    let mut persistence = MockPersistence::new();
    persistence.expect_last_valid_state().never();
    let mut snapshots = MockSnapshots::new();
    snapshots.expect_all_snapshots().never();
    let (manager, _) = manager(persistence, snapshots);

    let state = valid_ficha("f5");
    let result = manager
        .validate_and_recover(&FichaId::new("f5"), state.clone())
        .await;
    assert!(result.success);
    assert_eq!(result.state, state);
    assert_eq!(result.message, "state is valid");
    assert!(manager.recovery_log().is_empty());
}

#[tokio::test]
async fn test_validate_and_recover_logs_invalid_state() {
    let mut persistence = MockPersistence::new();
    persistence
        .expect_last_valid_state()
        .returning(|id| Ok(Some(valid_ficha(id.as_str()))));
    let mut snapshots = MockSnapshots::new();
    snapshots.expect_all_snapshots().never();
    let (manager, registry) = manager(persistence, snapshots);

    let id = FichaId::new("f6");
    let result = manager
        .validate_and_recover(&id, FichaState::base(&id))
        .await;
    assert_eq!(result.source, RecoverySource::LastValid);
    assert_eq!(result.message, "recovered from last valid state");

    let validations = registry.event_log(&id).by_kind(EventKind::Validate);
    assert_eq!(validations.len(), 1);
    assert_eq!(validations[0].severity, EventSeverity::Warning);
    assert_eq!(manager.recovery_log().len(), 1);
}
