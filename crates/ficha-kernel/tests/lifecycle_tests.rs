use ficha_kernel::error::LifecycleError;
use ficha_kernel::lifecycle::{CallbackError, LifecycleManager, LifecyclePhase, ResourceKind};
use ficha_kernel::registry::FichaRegistry;
use ficha_model::FichaId;
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_phase_sequence() {
    let lifecycle = LifecycleManager::new(FichaId::new("l1"));
    assert_eq!(lifecycle.phase(), LifecyclePhase::Destroyed);
    assert!(!lifecycle.is_mounted());

    lifecycle.mount().await.unwrap();
    assert!(lifecycle.is_active());
    assert!(lifecycle.info().mounted_at.is_some());

    lifecycle.suspend().await.unwrap();
    assert!(lifecycle.is_mounted());
    assert!(!lifecycle.is_active());
    assert!(lifecycle.info().suspended_at.is_some());

    lifecycle.resume().await.unwrap();
    assert_eq!(lifecycle.phase(), LifecyclePhase::Resumed);
    assert!(lifecycle.info().suspended_at.is_none());

    lifecycle.destroy().await;
    assert_eq!(lifecycle.phase(), LifecyclePhase::Destroyed);
}

#[tokio::test]
async fn test_illegal_phase_changes() {
    let lifecycle = LifecycleManager::new(FichaId::new("l2"));
    assert_eq!(
        lifecycle.suspend().await,
        Err(LifecycleError::InvalidPhase {
            operation: "suspend",
            phase: LifecyclePhase::Destroyed,
        })
    );
    assert!(lifecycle.resume().await.is_err());

    lifecycle.mount().await.unwrap();
    assert!(lifecycle.mount().await.is_err());
    assert!(lifecycle.resume().await.is_err());
}

#[tokio::test]
async fn test_destroy_runs_cleanups_once() {
    let lifecycle = LifecycleManager::new(FichaId::new("l3"));
    lifecycle.mount().await.unwrap();

    let cleaned = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let cleaned = Arc::clone(&cleaned);
        lifecycle.register_resource(ResourceKind::Subscription, move || {
            cleaned.fetch_add(1, Ordering::SeqCst);
        });
    }
    let handle = tokio::spawn(futures::future::pending::<()>());
    lifecycle.register_task(handle);
    assert_eq!(lifecycle.resource_count(), 4);

    lifecycle.destroy().await;
    lifecycle.destroy().await;
    assert_eq!(cleaned.load(Ordering::SeqCst), 3);
    assert_eq!(lifecycle.resource_count(), 0);
}

#[tokio::test]
async fn test_unregister_runs_cleanup_immediately() {
    let lifecycle = LifecycleManager::new(FichaId::new("l4"));
    let cleaned = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cleaned);
    let id = lifecycle.register_resource(ResourceKind::Other, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(lifecycle.unregister_resource(&id));
    assert!(!lifecycle.unregister_resource(&id));
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_callback_does_not_propagate() {
    let lifecycle = LifecycleManager::new(FichaId::new("l5"));
    let calls = Arc::new(AtomicUsize::new(0));

    lifecycle.on_phase(LifecyclePhase::Mounted, |_, _| {
        async { Err::<(), CallbackError>("listener crashed".into()) }.boxed()
    });
    let counter = Arc::clone(&calls);
    lifecycle.on_phase(LifecyclePhase::Mounted, move |id, phase| {
        let counter = Arc::clone(&counter);
        async move {
            assert_eq!(id.as_str(), "l5");
            assert_eq!(phase, LifecyclePhase::Mounted);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), CallbackError>(())
        }
        .boxed()
    });

    lifecycle.mount().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_callback_is_contained() {
    let lifecycle = LifecycleManager::new(FichaId::new("l7"));
    let calls = Arc::new(AtomicUsize::new(0));

    lifecycle.on_phase(LifecyclePhase::Mounted, |_, _| panic!("listener blew up"));
    lifecycle.on_phase(LifecyclePhase::Destroyed, |_, _| {
        async { panic!("teardown blew up") }.boxed()
    });
    for phase in [LifecyclePhase::Mounted, LifecyclePhase::Destroyed] {
        let counter = Arc::clone(&calls);
        lifecycle.on_phase(phase, move |_, _| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), CallbackError>(())
            }
            .boxed()
        });
    }

    lifecycle.mount().await.unwrap();
    assert!(lifecycle.is_mounted());
    lifecycle.destroy().await;
    assert_eq!(lifecycle.phase(), LifecyclePhase::Destroyed);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_registry_remove_and_destroy() {
    let registry = FichaRegistry::default();
    let id = FichaId::new("l6");
    let lifecycle = registry.lifecycle(&id);
    lifecycle.mount().await.unwrap();
    registry.machine(&id);

    assert!(registry.remove_and_destroy(&id).await);
    assert_eq!(lifecycle.phase(), LifecyclePhase::Destroyed);
    assert!(registry.get_machine(&id).is_none());
    assert!(!registry.remove_and_destroy(&id).await);
}
