//! Service lifecycle integration tests.
//!
//! Verify init/start/pause/resume/shutdown/destroy guards, idempotence,
//! configuration-driven setup, and the remote-engine auto-start override.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use quartzite::engine::INSTANCE_NAME_KEY;
use quartzite::testing::StubEngine;
use quartzite::{
    Engine, ErrorKind, LocalEngine, SchedulerService, SchedulerServiceState, ServiceConfig,
    AUTO_START_KEY, WAIT_FOR_JOBS_KEY,
};

fn local_service(name: &str) -> SchedulerService {
    let engine = LocalEngine::new(name).with_tick_interval(Duration::from_millis(20));
    SchedulerService::with_engine(Arc::new(engine))
}

#[test]
fn test_full_lifecycle_transitions() {
    let service = SchedulerService::new();
    assert_eq!(
        service.state().unwrap(),
        SchedulerServiceState::Uninitialized
    );

    let service = local_service("Lifecycle");
    service.init().unwrap();
    assert_eq!(service.state().unwrap(), SchedulerServiceState::Running);

    service.pause().unwrap();
    assert_eq!(service.state().unwrap(), SchedulerServiceState::Standby);
    assert!(!service.is_job_running().unwrap());

    service.resume().unwrap();
    assert_eq!(service.state().unwrap(), SchedulerServiceState::Running);
    assert!(service.is_job_running().unwrap());

    service.shutdown().unwrap();
    assert_eq!(service.state().unwrap(), SchedulerServiceState::ShutDown);
}

#[test]
fn test_double_lifecycle_calls_are_no_ops() {
    let service = local_service("Idempotent");
    service.init().unwrap();

    for _ in 0..2 {
        service.start().unwrap();
        assert_eq!(service.state().unwrap(), SchedulerServiceState::Running);
    }
    for _ in 0..2 {
        service.pause().unwrap();
        assert_eq!(service.state().unwrap(), SchedulerServiceState::Standby);
    }
    for _ in 0..2 {
        service.resume().unwrap();
        assert_eq!(service.state().unwrap(), SchedulerServiceState::Running);
    }
    for _ in 0..2 {
        service.shutdown().unwrap();
        assert_eq!(service.state().unwrap(), SchedulerServiceState::ShutDown);
    }
}

#[test]
fn test_init_from_properties_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# scheduler config").unwrap();
    writeln!(file, "{}=FileConfigured", INSTANCE_NAME_KEY).unwrap();
    writeln!(file, "{}=false", AUTO_START_KEY).unwrap();
    writeln!(file, "{}=false", WAIT_FOR_JOBS_KEY).unwrap();

    let config = ServiceConfig::from_properties_file(file.path()).unwrap();
    let service = SchedulerService::with_config(config);
    service.init().unwrap();

    assert_eq!(service.name().as_deref(), Some("FileConfigured"));
    assert!(!service.auto_start());
    assert!(!service.wait_for_jobs_to_complete());
    assert_eq!(service.state().unwrap(), SchedulerServiceState::Standby);

    service.shutdown().unwrap();
}

#[test]
fn test_init_without_config_or_engine_fails() {
    let service = SchedulerService::new();
    let err = service.init().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigurationMissing);
}

#[test]
fn test_remote_engine_never_auto_starts() {
    let service =
        SchedulerService::with_engine(Arc::new(StubEngine::new("Remote").with_remote(true)));
    service.init().unwrap();

    // auto_start defaulted true but the remote engine forced it off.
    assert!(!service.auto_start());
    assert_eq!(service.state().unwrap(), SchedulerServiceState::Standby);
    assert!(service.is_remote().unwrap());
}

#[test]
fn test_destroy_releases_the_engine() {
    let engine = Arc::new(LocalEngine::new("Released"));
    let service = SchedulerService::with_engine(engine.clone());
    service.init().unwrap();

    service.destroy().unwrap();
    assert!(engine.is_shutdown().unwrap());
    assert_eq!(
        service.state().unwrap(),
        SchedulerServiceState::Uninitialized
    );
    assert!(service.start().is_err());
}

#[test]
fn test_destroy_leaves_remote_engine_running() {
    let engine = Arc::new(StubEngine::new("SharedRemote").with_remote(true));
    let service = SchedulerService::with_engine(engine.clone());
    service.init().unwrap();

    service.destroy().unwrap();
    assert!(!engine.is_shutdown().unwrap());
}

#[test]
fn test_pre_supplied_engine_makes_init_idempotent() {
    let service = local_service("ReInit");
    service.init().unwrap();
    let name = service.name();

    service.init().unwrap();
    assert_eq!(service.name(), name);

    service.shutdown().unwrap();
}

#[test]
fn test_engine_failure_surfaces_as_scheduler_problem() {
    let engine = Arc::new(StubEngine::new("Failing"));
    let service = SchedulerService::with_engine(engine.clone());
    service.init().unwrap();

    engine.fail_standby(true);
    let err = service.pause().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchedulerProblem);
    assert!(std::error::Error::source(&err).is_some());
}
