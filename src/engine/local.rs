//! In-process scheduling engine.
//!
//! [`LocalEngine`] keeps jobs and triggers in memory and drives execution
//! from a background ticker thread. Shutdown can block until in-flight
//! executions drain, tracked behind a mutex/condvar pair. Execution always
//! happens in this process, so the engine never reports itself remote.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::core::{
    ExecutionId, JobContext, JobDefinition, JobKey, TriggerDefinition, TriggerKey,
};

use super::{Engine, EngineError, EngineMetaData};

/// Property key for the engine instance name.
pub const INSTANCE_NAME_KEY: &str = "quartzite.engine.instanceName";

/// Property key for the ticker interval in milliseconds.
pub const TICK_MILLIS_KEY: &str = "quartzite.engine.tickMillis";

const DEFAULT_INSTANCE_NAME: &str = "QuartziteEngine";
const DEFAULT_TICK_MILLIS: u64 = 250;

/// Cap on how many missed occurrences are counted per trigger per tick.
const MAX_MISSED_SCAN: usize = 100;

struct TriggerState {
    def: TriggerDefinition,
    next_fire: Option<DateTime<Utc>>,
}

struct Core {
    jobs: BTreeMap<JobKey, JobDefinition>,
    triggers: BTreeMap<TriggerKey, TriggerState>,
    started: bool,
    standby: bool,
    shut_down: bool,
    jobs_executed: u64,
}

/// In-flight execution tracking. `shutdown(wait_for_jobs = true)` waits on
/// the condvar until the active map empties.
struct Inflight {
    active: Mutex<HashMap<ExecutionId, JobKey>>,
    drained: Condvar,
}

impl Inflight {
    fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            drained: Condvar::new(),
        }
    }

    fn begin(&self, id: ExecutionId, job: JobKey) {
        self.active
            .lock()
            .expect("inflight table poisoned")
            .insert(id, job);
    }

    fn finish(&self, id: &ExecutionId) {
        let mut active = self.active.lock().expect("inflight table poisoned");
        active.remove(id);
        if active.is_empty() {
            self.drained.notify_all();
        }
    }

    fn count(&self) -> usize {
        self.active.lock().expect("inflight table poisoned").len()
    }

    fn wait_until_empty(&self) {
        let mut active = self.active.lock().expect("inflight table poisoned");
        while !active.is_empty() {
            active = self
                .drained
                .wait(active)
                .expect("inflight table poisoned");
        }
    }
}

/// An in-memory engine with a background firing thread.
pub struct LocalEngine {
    name: String,
    tick_interval: Duration,
    core: Arc<Mutex<Core>>,
    inflight: Arc<Inflight>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<AtomicBool>,
}

impl LocalEngine {
    /// Create an engine with the given instance name and the default tick
    /// interval.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MILLIS),
            core: Arc::new(Mutex::new(Core {
                jobs: BTreeMap::new(),
                triggers: BTreeMap::new(),
                started: false,
                standby: false,
                shut_down: false,
                jobs_executed: 0,
            })),
            inflight: Arc::new(Inflight::new()),
            ticker: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Construct an engine from a flat property set.
    ///
    /// Recognized keys: [`INSTANCE_NAME_KEY`] and [`TICK_MILLIS_KEY`];
    /// everything else is ignored here and may be consumed by other layers.
    pub fn from_properties(config: &ServiceConfig) -> Result<Self, EngineError> {
        let name = config
            .get(INSTANCE_NAME_KEY)
            .unwrap_or(DEFAULT_INSTANCE_NAME)
            .to_string();

        let mut engine = Self::new(name);

        if let Some(raw) = config.get(TICK_MILLIS_KEY) {
            let millis: u64 = raw.parse().map_err(|_| {
                EngineError::Internal(format!("invalid {} value: {}", TICK_MILLIS_KEY, raw))
            })?;
            if millis == 0 {
                return Err(EngineError::Internal(format!(
                    "{} must be positive",
                    TICK_MILLIS_KEY
                )));
            }
            engine.tick_interval = Duration::from_millis(millis);
        }

        Ok(engine)
    }

    /// Override the ticker interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Number of executions currently in flight.
    pub fn running_executions(&self) -> usize {
        self.inflight.count()
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().expect("engine state poisoned")
    }

    fn ensure_open(core: &Core) -> Result<(), EngineError> {
        if core.shut_down {
            Err(EngineError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// First fire time for a freshly registered trigger. A start bound equal
    /// to the registration instant still counts as a fire.
    fn initial_fire_time(
        trigger: &TriggerDefinition,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, EngineError> {
        trigger
            .fire_time_after(now - chrono::Duration::milliseconds(1))
            .ok_or_else(|| EngineError::NeverFires(trigger.key().clone()))
    }

    fn ensure_ticker(&self) -> Result<(), EngineError> {
        let mut ticker = self.ticker.lock().expect("ticker handle poisoned");
        if ticker.is_some() {
            return Ok(());
        }

        let core = Arc::clone(&self.core);
        let inflight = Arc::clone(&self.inflight);
        let stop = Arc::clone(&self.stop);
        let interval = self.tick_interval;

        let handle = std::thread::Builder::new()
            .name(format!("{}-ticker", self.name))
            .spawn(move || run_ticker(core, inflight, stop, interval))
            .map_err(|e| {
                EngineError::Internal(format!("failed to spawn ticker thread: {}", e))
            })?;
        *ticker = Some(handle);
        Ok(())
    }
}

impl Engine for LocalEngine {
    fn name(&self) -> Result<String, EngineError> {
        Ok(self.name.clone())
    }

    fn metadata(&self) -> Result<EngineMetaData, EngineError> {
        let core = self.core();
        Ok(EngineMetaData {
            name: self.name.clone(),
            started: core.started,
            in_standby: core.standby,
            shut_down: core.shut_down,
            remote: false,
            jobs_executed: core.jobs_executed,
        })
    }

    fn is_started(&self) -> Result<bool, EngineError> {
        Ok(self.core().started)
    }

    fn is_in_standby(&self) -> Result<bool, EngineError> {
        Ok(self.core().standby)
    }

    fn is_shutdown(&self) -> Result<bool, EngineError> {
        Ok(self.core().shut_down)
    }

    fn start(&self) -> Result<(), EngineError> {
        let mut core = self.core();
        Self::ensure_open(&core)?;

        if !core.started {
            core.started = true;
            core.standby = false;
            drop(core);
            self.ensure_ticker()?;
            info!(engine = %self.name, "engine started");
        } else if core.standby {
            core.standby = false;
            info!(engine = %self.name, "engine left standby");
        }
        Ok(())
    }

    fn standby(&self) -> Result<(), EngineError> {
        let mut core = self.core();
        Self::ensure_open(&core)?;

        if !core.standby {
            core.standby = true;
            info!(engine = %self.name, "engine placed in standby");
        }
        Ok(())
    }

    fn shutdown(&self, wait_for_jobs: bool) -> Result<(), EngineError> {
        {
            let mut core = self.core();
            if core.shut_down {
                return Ok(());
            }
            core.shut_down = true;
            core.started = false;
            core.standby = false;
        }

        self.stop.store(true, Ordering::Relaxed);
        let handle = self
            .ticker
            .lock()
            .expect("ticker handle poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }

        if wait_for_jobs {
            self.inflight.wait_until_empty();
        }

        info!(engine = %self.name, wait_for_jobs, "engine shut down");
        Ok(())
    }

    fn add_job(&self, job: JobDefinition) -> Result<(), EngineError> {
        let mut core = self.core();
        Self::ensure_open(&core)?;

        if !job.is_durable() {
            return Err(EngineError::NotDurable(job.key().clone()));
        }
        if core.jobs.contains_key(job.key()) {
            return Err(EngineError::DuplicateJob(job.key().clone()));
        }

        debug!(job = %job.key(), "stored durable job");
        core.jobs.insert(job.key().clone(), job);
        Ok(())
    }

    fn schedule_job(
        &self,
        job: JobDefinition,
        trigger: TriggerDefinition,
    ) -> Result<DateTime<Utc>, EngineError> {
        let mut core = self.core();
        Self::ensure_open(&core)?;

        if trigger.job() != job.key() {
            return Err(EngineError::Internal(format!(
                "trigger {} references job {}, not {}",
                trigger.key(),
                trigger.job(),
                job.key()
            )));
        }
        if core.jobs.contains_key(job.key()) {
            return Err(EngineError::DuplicateJob(job.key().clone()));
        }
        if core.triggers.contains_key(trigger.key()) {
            return Err(EngineError::DuplicateTrigger(trigger.key().clone()));
        }

        let next = Self::initial_fire_time(&trigger, Utc::now())?;
        core.jobs.insert(job.key().clone(), job);
        core.triggers.insert(
            trigger.key().clone(),
            TriggerState {
                def: trigger,
                next_fire: Some(next),
            },
        );
        Ok(next)
    }

    fn schedule_trigger(&self, trigger: TriggerDefinition) -> Result<DateTime<Utc>, EngineError> {
        let mut core = self.core();
        Self::ensure_open(&core)?;

        if !core.jobs.contains_key(trigger.job()) {
            return Err(EngineError::JobNotFound(trigger.job().clone()));
        }
        if core.triggers.contains_key(trigger.key()) {
            return Err(EngineError::DuplicateTrigger(trigger.key().clone()));
        }

        let next = Self::initial_fire_time(&trigger, Utc::now())?;
        core.triggers.insert(
            trigger.key().clone(),
            TriggerState {
                def: trigger,
                next_fire: Some(next),
            },
        );
        Ok(next)
    }

    fn unschedule_job(&self, key: &TriggerKey) -> Result<bool, EngineError> {
        let mut core = self.core();
        Self::ensure_open(&core)?;

        let Some(state) = core.triggers.remove(key) else {
            return Ok(false);
        };

        remove_orphaned_job(&mut core, state.def.job());
        Ok(true)
    }

    fn delete_job(&self, key: &JobKey) -> Result<bool, EngineError> {
        let mut core = self.core();
        Self::ensure_open(&core)?;

        if core.jobs.remove(key).is_none() {
            return Ok(false);
        }
        core.triggers.retain(|_, state| state.def.job() != key);
        Ok(true)
    }

    fn job_group_names(&self) -> Result<Vec<String>, EngineError> {
        let core = self.core();
        let mut groups: Vec<String> = Vec::new();
        for key in core.jobs.keys() {
            if groups.last().map(String::as_str) != Some(key.group()) {
                groups.push(key.group().to_string());
            }
        }
        Ok(groups)
    }

    fn job_names(&self, group: &str) -> Result<Vec<String>, EngineError> {
        let core = self.core();
        Ok(core
            .jobs
            .keys()
            .filter(|key| key.group() == group)
            .map(|key| key.name().to_string())
            .collect())
    }

    fn job_detail(&self, key: &JobKey) -> Result<Option<JobDefinition>, EngineError> {
        Ok(self.core().jobs.get(key).cloned())
    }

    fn trigger(&self, key: &TriggerKey) -> Result<Option<TriggerDefinition>, EngineError> {
        Ok(self.core().triggers.get(key).map(|state| state.def.clone()))
    }

    fn triggers_of_job(&self, key: &JobKey) -> Result<Vec<TriggerDefinition>, EngineError> {
        let core = self.core();
        Ok(core
            .triggers
            .values()
            .filter(|state| state.def.job() == key)
            .map(|state| state.def.clone())
            .collect())
    }
}

impl Drop for LocalEngine {
    fn drop(&mut self) {
        // Let a still-running ticker exit on its next wakeup.
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Remove a job that lost its last trigger, unless it is durable.
fn remove_orphaned_job(core: &mut Core, job_key: &JobKey) {
    let still_referenced = core
        .triggers
        .values()
        .any(|state| state.def.job() == job_key);
    if still_referenced {
        return;
    }

    let durable = core
        .jobs
        .get(job_key)
        .map(JobDefinition::is_durable)
        .unwrap_or(true);
    if !durable {
        core.jobs.remove(job_key);
        debug!(job = %job_key, "removed non-durable job with no remaining triggers");
    }
}

/// One due firing collected under the core lock.
struct Firing {
    job: JobDefinition,
    trigger: TriggerKey,
    data: HashMap<String, serde_json::Value>,
    scheduled_time: DateTime<Utc>,
}

fn run_ticker(
    core: Arc<Mutex<Core>>,
    inflight: Arc<Inflight>,
    stop: Arc<AtomicBool>,
    interval: Duration,
) {
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(interval);
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let firings = collect_due(&core);
        for firing in firings {
            dispatch(firing, &inflight);
        }
    }
}

/// Advance due triggers and return what should fire this tick.
///
/// When several occurrences were missed (standby, slow tick), the trigger
/// fires once and the skipped occurrences are logged, never replayed.
fn collect_due(core: &Arc<Mutex<Core>>) -> Vec<Firing> {
    let mut guard = core.lock().expect("engine state poisoned");
    if !guard.started || guard.standby || guard.shut_down {
        return Vec::new();
    }

    let now = Utc::now();
    let mut firings = Vec::new();
    let mut exhausted: Vec<TriggerKey> = Vec::new();

    for (key, state) in guard.triggers.iter_mut() {
        let Some(fire_time) = state.next_fire else {
            continue;
        };
        if fire_time > now {
            continue;
        }

        // Skip occurrences already in the past, keeping only this firing.
        let mut skipped = 0usize;
        let mut cursor = fire_time;
        let next = loop {
            match state.def.fire_time_after(cursor) {
                Some(t) if t <= now && skipped < MAX_MISSED_SCAN => {
                    skipped += 1;
                    cursor = t;
                }
                other => break other,
            }
        };
        if skipped > 0 {
            warn!(
                trigger = %key,
                skipped,
                "missed fire times collapsed into a single firing"
            );
        }

        state.next_fire = next;
        if next.is_none() {
            exhausted.push(key.clone());
        }

        firings.push((key.clone(), state.def.job().clone(), fire_time));
    }

    let mut out = Vec::with_capacity(firings.len());
    for (trigger_key, job_key, scheduled_time) in firings {
        let Some(job) = guard.jobs.get(&job_key).cloned() else {
            continue;
        };
        guard.jobs_executed += 1;
        let data = job.data().clone();
        out.push(Firing {
            job,
            trigger: trigger_key,
            data,
            scheduled_time,
        });
    }

    // Exhausted triggers are removed only after their final firing was
    // collected, so that firing still sees its job definition.
    for key in exhausted {
        if let Some(state) = guard.triggers.remove(&key) {
            debug!(trigger = %key, "trigger exhausted and removed");
            remove_orphaned_job(&mut guard, state.def.job());
        }
    }

    out
}

fn dispatch(firing: Firing, inflight: &Arc<Inflight>) {
    let execution_id = ExecutionId::new();
    let job_key = firing.job.key().clone();
    inflight.begin(execution_id, job_key.clone());

    let tracker = Arc::clone(inflight);
    let spawned = std::thread::Builder::new()
        .name(format!("exec-{}", job_key.name()))
        .spawn(move || {
            let ctx = JobContext {
                execution_id,
                job: firing.job.key().clone(),
                trigger: firing.trigger.clone(),
                scheduled_time: firing.scheduled_time,
                data: firing.data,
            };

            let runner = Arc::clone(firing.job.runner());
            let outcome = catch_unwind(AssertUnwindSafe(|| runner.run(&ctx)));
            match outcome {
                Ok(Ok(())) => {
                    debug!(job = %ctx.job, execution = %ctx.execution_id, "job execution completed")
                }
                Ok(Err(e)) => {
                    warn!(job = %ctx.job, execution = %ctx.execution_id, error = %e, "job execution failed")
                }
                Err(_) => {
                    error!(job = %ctx.job, execution = %ctx.execution_id, "job execution panicked")
                }
            }

            tracker.finish(&execution_id);
        });

    if let Err(e) = spawned {
        error!(job = %job_key, error = %e, "failed to spawn execution thread");
        inflight.finish(&execution_id);
    }
}
