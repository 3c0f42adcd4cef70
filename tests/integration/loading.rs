//! Declarative job-document loading through the service layer.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use quartzite::{
    loader, ErrorKind, JobKey, LocalEngine, SchedulerService, TriggerKey,
};

const DOCUMENT: &str = r#"
jobs:
  - name: report
    group: etl
    durable: true
    description: nightly report run
    command:
      program: "true"
    data:
      target: warehouse
  - name: cleanup
    command:
      program: "true"
triggers:
  - name: nightly
    group: etl
    job: report
    job_group: etl
    schedule: "@daily"
  - name: cleanup_tick
    job: cleanup
    schedule: "@every 10m"
"#;

fn service(name: &str) -> SchedulerService {
    let engine = LocalEngine::new(name).with_tick_interval(Duration::from_millis(20));
    SchedulerService::with_engine(Arc::new(engine))
}

#[test]
fn test_load_jobs_reports_what_was_registered() {
    let svc = service("Loader");
    svc.init().unwrap();

    let report = svc.load_jobs(DOCUMENT).unwrap();
    assert_eq!(report.jobs().len(), 2);
    assert_eq!(report.triggers().len(), 2);
    assert!(report.jobs().contains(&JobKey::new("report", "etl")));
    assert!(report
        .triggers()
        .contains(&TriggerKey::new("nightly", "etl")));

    // Everything the report names is visible through the service.
    let details = svc.get_job_details().unwrap();
    assert_eq!(details.len(), 2);
    let report_job = svc
        .get_job_detail(&JobKey::new("report", "etl"))
        .unwrap()
        .expect("loaded job should exist");
    assert!(report_job.is_durable());
    assert_eq!(report_job.description(), Some("nightly report run"));

    let triggers = svc.get_triggers(&JobKey::new("report", "etl")).unwrap();
    assert_eq!(triggers.len(), 1);

    svc.shutdown().unwrap();
}

#[test]
fn test_load_jobs_wraps_parse_errors_as_scheduler_problem() {
    let svc = service("BadDoc");
    svc.init().unwrap();

    let err = svc.load_jobs("jobs: [not, closed").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchedulerProblem);
    assert!(std::error::Error::source(&err).is_some());

    svc.shutdown().unwrap();
}

#[test]
fn test_load_jobs_wraps_registration_errors() {
    let svc = service("DupDoc");
    svc.init().unwrap();

    svc.load_jobs(DOCUMENT).unwrap();
    // Loading the same document again collides on every key.
    let err = svc.load_jobs(DOCUMENT).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchedulerProblem);

    svc.shutdown().unwrap();
}

#[test]
fn test_load_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DOCUMENT.as_bytes()).unwrap();

    let engine = LocalEngine::new("FileLoader");
    let report = loader::load_file(file.path(), &engine).unwrap();
    assert_eq!(report.jobs().len(), 2);
    assert_eq!(report.triggers().len(), 2);
}

#[test]
fn test_load_before_init_fails() {
    let svc = SchedulerService::new();
    assert!(svc.load_jobs(DOCUMENT).is_err());
}
