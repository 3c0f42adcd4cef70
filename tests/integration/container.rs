//! Container registry and per-session finder integration tests.

use std::sync::Arc;

use quartzite::{
    ErrorKind, LocalEngine, SchedulerService, SchedulerServiceContainer, SchedulerServiceFinder,
    SessionKey,
};

fn service(engine_name: &str) -> Arc<SchedulerService> {
    Arc::new(SchedulerService::with_engine(Arc::new(LocalEngine::new(
        engine_name,
    ))))
}

#[test]
fn test_duplicate_registration_fails() {
    let container = SchedulerServiceContainer::new();
    container.add_scheduler_service("main", service("E1")).unwrap();

    let err = container
        .add_scheduler_service("main", service("E2"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateName);
}

#[test]
fn test_registration_order_survives_removals() {
    let container = SchedulerServiceContainer::new();
    for name in ["one", "two", "three"] {
        container.add_scheduler_service(name, service(name)).unwrap();
    }
    assert_eq!(container.scheduler_service_names(), ["one", "two", "three"]);

    container.remove_scheduler_service("two").unwrap();
    container.add_scheduler_service("four", service("four")).unwrap();
    assert_eq!(
        container.scheduler_service_names(),
        ["one", "three", "four"]
    );
}

#[test]
fn test_container_lifecycle_fan_out() {
    let container = SchedulerServiceContainer::new();
    let a = service("A");
    let b = service("B");
    container.add_scheduler_service("a", Arc::clone(&a)).unwrap();
    container.add_scheduler_service("b", Arc::clone(&b)).unwrap();

    container.init().unwrap();
    assert_eq!(a.name().as_deref(), Some("A"));
    assert_eq!(b.name().as_deref(), Some("B"));
    assert!(a.is_job_running().unwrap());

    container.destroy().unwrap();
    assert!(a.is_job_running().is_err());
}

#[test]
fn test_fresh_session_selects_first_registered_name() {
    let container = Arc::new(SchedulerServiceContainer::new());
    container.add_scheduler_service("A", service("A")).unwrap();
    container.add_scheduler_service("B", service("B")).unwrap();

    let finder = SchedulerServiceFinder::new(Arc::clone(&container));
    let session = SessionKey::new("fresh-session");

    let data = finder.get_or_create_session_data(&session);
    assert_eq!(data.current_scheduler_name(), Some("A"));

    let resolved = finder.find(&session).unwrap();
    resolved.init().unwrap();
    assert_eq!(resolved.scheduler_name().unwrap(), "A");
    resolved.shutdown().unwrap();
}

#[test]
fn test_empty_container_is_not_fatal_for_session_data() {
    let finder = SchedulerServiceFinder::new(Arc::new(SchedulerServiceContainer::new()));
    let session = SessionKey::new("empty");

    let data = finder.get_or_create_session_data(&session);
    assert_eq!(data.current_scheduler_name(), None);

    let err = finder.find(&session).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_session_selection_can_be_switched() {
    let container = Arc::new(SchedulerServiceContainer::new());
    container.add_scheduler_service("A", service("A")).unwrap();
    container.add_scheduler_service("B", service("B")).unwrap();

    let finder = SchedulerServiceFinder::new(Arc::clone(&container));
    let session = SessionKey::new("switcher");

    finder.set_current_scheduler(&session, "B").unwrap();
    let resolved = finder.find(&session).unwrap();
    resolved.init().unwrap();
    assert_eq!(resolved.scheduler_name().unwrap(), "B");
    resolved.shutdown().unwrap();

    let err = finder.set_current_scheduler(&session, "missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
