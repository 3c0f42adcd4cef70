//! Job and trigger CRUD against a live local engine, plus fire-time
//! projection properties.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use quartzite::testing::CountingRunner;
use quartzite::{
    FireRule, FireTime, JobDefinition, JobKey, LocalEngine, SchedulerService, TriggerDefinition,
    TriggerKey,
};

use crate::common::wait_until;

fn service(name: &str) -> SchedulerService {
    let engine = LocalEngine::new(name).with_tick_interval(Duration::from_millis(20));
    SchedulerService::with_engine(Arc::new(engine))
}

fn job(name: &str) -> JobDefinition {
    JobDefinition::new(JobKey::with_default_group(name), CountingRunner::new())
}

fn trigger(name: &str, job: &str, expr: &str) -> TriggerDefinition {
    TriggerDefinition::new(
        TriggerKey::with_default_group(name),
        JobKey::with_default_group(job),
        FireRule::parse(expr).unwrap(),
    )
}

#[test]
fn test_scheduled_job_listed_exactly_once() {
    let svc = service("ListOnce");
    svc.init().unwrap();

    svc.schedule_job(job("etl"), trigger("etl_t", "etl", "@hourly"))
        .unwrap();

    let details = svc.get_job_details().unwrap();
    assert_eq!(
        details
            .iter()
            .filter(|j| j.key() == &JobKey::with_default_group("etl"))
            .count(),
        1
    );

    let triggers = svc.get_triggers(&JobKey::with_default_group("etl")).unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].key(), &TriggerKey::with_default_group("etl_t"));

    svc.shutdown().unwrap();
}

#[test]
fn test_unschedule_returns_the_removed_trigger() {
    let svc = service("Unschedule");
    svc.init().unwrap();

    svc.schedule_job(job("j"), trigger("t", "j", "@hourly"))
        .unwrap();

    let removed = svc
        .unschedule_job(&TriggerKey::with_default_group("t"))
        .unwrap();
    assert_eq!(removed.key(), &TriggerKey::with_default_group("t"));
    assert_eq!(removed.job(), &JobKey::with_default_group("j"));

    // Non-durable job with no remaining triggers is gone too.
    assert!(svc
        .get_job_details()
        .unwrap()
        .iter()
        .all(|j| j.key() != &JobKey::with_default_group("j")));

    svc.shutdown().unwrap();
}

#[test]
fn test_unschedule_spares_durable_jobs() {
    let svc = service("Durable");
    svc.init().unwrap();

    svc.schedule_job(
        job("keeper").with_durable(true),
        trigger("t", "keeper", "@hourly"),
    )
    .unwrap();
    svc.unschedule_job(&TriggerKey::with_default_group("t"))
        .unwrap();

    assert!(svc
        .get_job_detail(&JobKey::with_default_group("keeper"))
        .unwrap()
        .is_some());

    svc.shutdown().unwrap();
}

#[test]
fn test_delete_job_returns_exactly_its_triggers() {
    let svc = service("Delete");
    svc.init().unwrap();

    svc.schedule_job(job("victim"), trigger("v1", "victim", "@hourly"))
        .unwrap();
    svc.schedule_trigger(trigger("v2", "victim", "@daily"))
        .unwrap();
    svc.schedule_job(job("bystander"), trigger("b1", "bystander", "@hourly"))
        .unwrap();

    let removed = svc
        .delete_job(&JobKey::with_default_group("victim"))
        .unwrap();
    let mut names: Vec<&str> = removed.iter().map(|t| t.key().name()).collect();
    names.sort();
    assert_eq!(names, ["v1", "v2"]);

    assert!(svc
        .get_triggers(&JobKey::with_default_group("victim"))
        .unwrap()
        .is_empty());
    // The other job kept its trigger.
    assert_eq!(
        svc.get_triggers(&JobKey::with_default_group("bystander"))
            .unwrap()
            .len(),
        1
    );

    svc.shutdown().unwrap();
}

#[test]
fn test_schedule_trigger_requires_existing_job() {
    let svc = service("NoJob");
    svc.init().unwrap();

    let err = svc
        .schedule_trigger(trigger("orphan", "missing", "@hourly"))
        .unwrap_err();
    assert!(err.to_string().contains("orphan"));

    svc.shutdown().unwrap();
}

#[test]
fn test_fire_times_every_sixty_seconds() {
    let start = Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap();
    let t = trigger("minutely", "j", "@every 60s").with_start_at(start);

    let times = SchedulerService::next_fire_times(&t, start, 5);
    assert_eq!(times.len(), 5);

    let mut previous = start;
    for fire in &times {
        let at = fire.time().expect("no exhausted marker expected");
        assert_eq!((at - previous).num_seconds(), 60);
        assert!(at > previous);
        previous = at;
    }
}

#[test]
fn test_fire_times_end_bound_yields_exhausted_marker() {
    let start = Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap();
    let t = trigger("bounded", "j", "@every 60s")
        .with_start_at(start)
        .with_end_at(start + chrono::Duration::seconds(150));

    let times = SchedulerService::next_fire_times(&t, start, 5);
    assert!(times.len() <= 3);
    assert_eq!(times.last(), Some(&FireTime::Exhausted));
    assert!(times[..times.len() - 1].iter().all(|f| !f.is_exhausted()));
}

#[test]
fn test_fire_times_zero_count_yields_empty() {
    let t = trigger("any", "j", "@every 60s");
    assert!(SchedulerService::next_fire_times(&t, Utc::now(), 0).is_empty());
}

#[test]
fn test_running_service_fires_scheduled_jobs() {
    let runner = CountingRunner::new();
    let svc = service("Fires");
    svc.init().unwrap();

    let start = Utc::now();
    let fast = TriggerDefinition::new(
        TriggerKey::with_default_group("fast"),
        JobKey::with_default_group("counted"),
        FireRule::parse("@every 1s").unwrap(),
    )
    .with_start_at(start);

    svc.schedule_job(
        JobDefinition::new(JobKey::with_default_group("counted"), runner.clone()),
        fast,
    )
    .unwrap();

    wait_until(Duration::from_secs(5), "job to fire at least once", || {
        runner.runs() >= 1
    });

    svc.shutdown().unwrap();
}

#[test]
fn test_paused_service_does_not_fire() {
    let runner = CountingRunner::new();
    let svc = service("Paused");
    svc.init().unwrap();
    svc.pause().unwrap();

    let start = Utc::now();
    let fast = TriggerDefinition::new(
        TriggerKey::with_default_group("fast"),
        JobKey::with_default_group("counted"),
        FireRule::parse("@every 1s").unwrap(),
    )
    .with_start_at(start);

    svc.schedule_job(
        JobDefinition::new(JobKey::with_default_group("counted"), runner.clone()),
        fast,
    )
    .unwrap();

    std::thread::sleep(Duration::from_millis(1500));
    assert_eq!(runner.runs(), 0, "standby engine must not fire triggers");

    svc.shutdown().unwrap();
}
