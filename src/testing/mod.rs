//! Test utilities for users of the quartzite library.
//!
//! - [`StubEngine`]: a full [`Engine`] implementation with no background
//!   threads, a configurable remote flag, and per-operation failure
//!   injection
//! - [`CountingRunner`]: a payload that records how often it ran
//! - [`FailingRunner`]: a payload that fails N times then succeeds

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::core::{
    JobContext, JobDefinition, JobKey, JobRunError, JobRunner, TriggerDefinition, TriggerKey,
};
use crate::engine::{Engine, EngineError, EngineMetaData};

struct StubState {
    jobs: BTreeMap<JobKey, JobDefinition>,
    triggers: BTreeMap<TriggerKey, TriggerDefinition>,
    started: bool,
    standby: bool,
    shut_down: bool,
    jobs_executed: u64,
}

/// An engine double that never fires anything on its own.
///
/// Failure switches make the next matching call return
/// [`EngineError::Internal`], in the style of a storage wrapper that
/// injects errors per operation.
pub struct StubEngine {
    name: String,
    remote: bool,
    state: Mutex<StubState>,
    fail_start: AtomicBool,
    fail_standby: AtomicBool,
    fail_shutdown: AtomicBool,
    fail_schedule: AtomicBool,
    fail_unschedule: AtomicBool,
    fail_delete: AtomicBool,
    fail_metadata: AtomicBool,
}

impl StubEngine {
    /// A local (non-remote) stub with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: false,
            state: Mutex::new(StubState {
                jobs: BTreeMap::new(),
                triggers: BTreeMap::new(),
                started: false,
                standby: false,
                shut_down: false,
                jobs_executed: 0,
            }),
            fail_start: AtomicBool::new(false),
            fail_standby: AtomicBool::new(false),
            fail_shutdown: AtomicBool::new(false),
            fail_schedule: AtomicBool::new(false),
            fail_unschedule: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_metadata: AtomicBool::new(false),
        }
    }

    /// Report the engine as remote.
    pub fn with_remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    /// Make `start()` fail.
    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make `standby()` fail.
    pub fn fail_standby(&self, fail: bool) {
        self.fail_standby.store(fail, Ordering::SeqCst);
    }

    /// Make `shutdown()` fail.
    pub fn fail_shutdown(&self, fail: bool) {
        self.fail_shutdown.store(fail, Ordering::SeqCst);
    }

    /// Make `schedule_job`/`schedule_trigger`/`add_job` fail.
    pub fn fail_schedule(&self, fail: bool) {
        self.fail_schedule.store(fail, Ordering::SeqCst);
    }

    /// Make `unschedule_job` fail.
    pub fn fail_unschedule(&self, fail: bool) {
        self.fail_unschedule.store(fail, Ordering::SeqCst);
    }

    /// Make `delete_job` fail.
    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Make `metadata()` fail.
    pub fn fail_metadata(&self, fail: bool) {
        self.fail_metadata.store(fail, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().expect("stub engine state poisoned")
    }

    fn check(&self, switch: &AtomicBool, operation: &str) -> Result<(), EngineError> {
        if switch.load(Ordering::SeqCst) {
            Err(EngineError::Internal(format!(
                "injected {} failure",
                operation
            )))
        } else {
            Ok(())
        }
    }

    fn ensure_open(state: &StubState) -> Result<(), EngineError> {
        if state.shut_down {
            Err(EngineError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn initial_fire_time(trigger: &TriggerDefinition) -> Result<DateTime<Utc>, EngineError> {
        trigger
            .fire_time_after(Utc::now() - chrono::Duration::milliseconds(1))
            .ok_or_else(|| EngineError::NeverFires(trigger.key().clone()))
    }
}

impl Engine for StubEngine {
    fn name(&self) -> Result<String, EngineError> {
        Ok(self.name.clone())
    }

    fn metadata(&self) -> Result<EngineMetaData, EngineError> {
        self.check(&self.fail_metadata, "metadata")?;
        let state = self.state();
        Ok(EngineMetaData {
            name: self.name.clone(),
            started: state.started,
            in_standby: state.standby,
            shut_down: state.shut_down,
            remote: self.remote,
            jobs_executed: state.jobs_executed,
        })
    }

    fn is_started(&self) -> Result<bool, EngineError> {
        Ok(self.state().started)
    }

    fn is_in_standby(&self) -> Result<bool, EngineError> {
        Ok(self.state().standby)
    }

    fn is_shutdown(&self) -> Result<bool, EngineError> {
        Ok(self.state().shut_down)
    }

    fn start(&self) -> Result<(), EngineError> {
        self.check(&self.fail_start, "start")?;
        let mut state = self.state();
        Self::ensure_open(&state)?;
        state.started = true;
        state.standby = false;
        Ok(())
    }

    fn standby(&self) -> Result<(), EngineError> {
        self.check(&self.fail_standby, "standby")?;
        let mut state = self.state();
        Self::ensure_open(&state)?;
        state.standby = true;
        Ok(())
    }

    fn shutdown(&self, _wait_for_jobs: bool) -> Result<(), EngineError> {
        self.check(&self.fail_shutdown, "shutdown")?;
        let mut state = self.state();
        state.shut_down = true;
        state.started = false;
        state.standby = false;
        Ok(())
    }

    fn add_job(&self, job: JobDefinition) -> Result<(), EngineError> {
        self.check(&self.fail_schedule, "add_job")?;
        let mut state = self.state();
        Self::ensure_open(&state)?;

        if !job.is_durable() {
            return Err(EngineError::NotDurable(job.key().clone()));
        }
        if state.jobs.contains_key(job.key()) {
            return Err(EngineError::DuplicateJob(job.key().clone()));
        }
        state.jobs.insert(job.key().clone(), job);
        Ok(())
    }

    fn schedule_job(
        &self,
        job: JobDefinition,
        trigger: TriggerDefinition,
    ) -> Result<DateTime<Utc>, EngineError> {
        self.check(&self.fail_schedule, "schedule_job")?;
        let mut state = self.state();
        Self::ensure_open(&state)?;

        if state.jobs.contains_key(job.key()) {
            return Err(EngineError::DuplicateJob(job.key().clone()));
        }
        if state.triggers.contains_key(trigger.key()) {
            return Err(EngineError::DuplicateTrigger(trigger.key().clone()));
        }

        let next = Self::initial_fire_time(&trigger)?;
        state.jobs.insert(job.key().clone(), job);
        state.triggers.insert(trigger.key().clone(), trigger);
        Ok(next)
    }

    fn schedule_trigger(&self, trigger: TriggerDefinition) -> Result<DateTime<Utc>, EngineError> {
        self.check(&self.fail_schedule, "schedule_trigger")?;
        let mut state = self.state();
        Self::ensure_open(&state)?;

        if !state.jobs.contains_key(trigger.job()) {
            return Err(EngineError::JobNotFound(trigger.job().clone()));
        }
        if state.triggers.contains_key(trigger.key()) {
            return Err(EngineError::DuplicateTrigger(trigger.key().clone()));
        }

        let next = Self::initial_fire_time(&trigger)?;
        state.triggers.insert(trigger.key().clone(), trigger);
        Ok(next)
    }

    fn unschedule_job(&self, key: &TriggerKey) -> Result<bool, EngineError> {
        self.check(&self.fail_unschedule, "unschedule_job")?;
        let mut state = self.state();
        Self::ensure_open(&state)?;

        let Some(trigger) = state.triggers.remove(key) else {
            return Ok(false);
        };

        let job_key = trigger.job().clone();
        let still_referenced = state.triggers.values().any(|t| t.job() == &job_key);
        if !still_referenced {
            let durable = state
                .jobs
                .get(&job_key)
                .map(JobDefinition::is_durable)
                .unwrap_or(true);
            if !durable {
                state.jobs.remove(&job_key);
            }
        }
        Ok(true)
    }

    fn delete_job(&self, key: &JobKey) -> Result<bool, EngineError> {
        self.check(&self.fail_delete, "delete_job")?;
        let mut state = self.state();
        Self::ensure_open(&state)?;

        if state.jobs.remove(key).is_none() {
            return Ok(false);
        }
        state.triggers.retain(|_, trigger| trigger.job() != key);
        Ok(true)
    }

    fn job_group_names(&self) -> Result<Vec<String>, EngineError> {
        let state = self.state();
        let mut groups: Vec<String> = Vec::new();
        for key in state.jobs.keys() {
            if groups.last().map(String::as_str) != Some(key.group()) {
                groups.push(key.group().to_string());
            }
        }
        Ok(groups)
    }

    fn job_names(&self, group: &str) -> Result<Vec<String>, EngineError> {
        Ok(self
            .state()
            .jobs
            .keys()
            .filter(|key| key.group() == group)
            .map(|key| key.name().to_string())
            .collect())
    }

    fn job_detail(&self, key: &JobKey) -> Result<Option<JobDefinition>, EngineError> {
        Ok(self.state().jobs.get(key).cloned())
    }

    fn trigger(&self, key: &TriggerKey) -> Result<Option<TriggerDefinition>, EngineError> {
        Ok(self.state().triggers.get(key).cloned())
    }

    fn triggers_of_job(&self, key: &JobKey) -> Result<Vec<TriggerDefinition>, EngineError> {
        Ok(self
            .state()
            .triggers
            .values()
            .filter(|trigger| trigger.job() == key)
            .cloned()
            .collect())
    }
}

/// A payload that counts its executions.
pub struct CountingRunner {
    runs: AtomicUsize,
}

impl CountingRunner {
    /// A fresh counter behind an `Arc` so tests can keep a handle.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            runs: AtomicUsize::new(0),
        })
    }

    /// How many times the payload ran.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl JobRunner for CountingRunner {
    fn run(&self, _ctx: &JobContext) -> Result<(), JobRunError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A payload that fails a configurable number of times, then succeeds.
pub struct FailingRunner {
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl FailingRunner {
    /// Fails `fail_count` times before the first success.
    pub fn new(fail_count: usize) -> Arc<Self> {
        Arc::new(Self {
            failures_remaining: AtomicUsize::new(fail_count),
            calls: AtomicUsize::new(0),
        })
    }

    /// Total invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl JobRunner for FailingRunner {
    fn run(&self, _ctx: &JobContext) -> Result<(), JobRunError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            Err(JobRunError::Failed("intentional test failure".to_string()))
        } else {
            Ok(())
        }
    }
}
