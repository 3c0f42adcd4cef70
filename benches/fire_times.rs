//! Fire-time projection benchmarks.

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quartzite::{FireRule, JobKey, SchedulerService, TriggerDefinition, TriggerKey};

fn trigger(expr: &str) -> TriggerDefinition {
    TriggerDefinition::new(
        TriggerKey::with_default_group("bench"),
        JobKey::with_default_group("bench"),
        FireRule::parse(expr).unwrap(),
    )
}

fn bench_fire_time_projection(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let interval = trigger("@every 5m");
    c.bench_function("project_100_interval_fire_times", |b| {
        b.iter(|| {
            SchedulerService::next_fire_times(black_box(&interval), black_box(start), 100)
        })
    });

    let cron = trigger("*/5 * * * *");
    c.bench_function("project_100_cron_fire_times", |b| {
        b.iter(|| SchedulerService::next_fire_times(black_box(&cron), black_box(start), 100))
    });
}

fn bench_rule_parsing(c: &mut Criterion) {
    c.bench_function("parse_cron_rule", |b| {
        b.iter(|| FireRule::parse(black_box("0 30 9 * * MON-FRI")))
    });
    c.bench_function("parse_interval_rule", |b| {
        b.iter(|| FireRule::parse(black_box("@every 1h30m")))
    });
}

criterion_group!(benches, bench_fire_time_projection, bench_rule_parsing);
criterion_main!(benches);
