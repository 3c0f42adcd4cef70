//! The scheduler service: owns one engine and mediates its lifecycle.
//!
//! A service is set up either with an engine instance directly or with
//! configuration properties; `init()` must run before anything else, and
//! `destroy()` releases the engine. The name is only assigned once `init()`
//! completes.
//!
//! Lifecycle calls are idempotent: starting a started service, pausing a
//! paused one, or shutting down twice are silent no-ops. Every engine
//! failure crossing this boundary is rethrown as a [`ServiceError`] with
//! the engine's own error preserved as the source.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::ServiceConfig;
use crate::core::{FireTime, JobDefinition, JobKey, TriggerDefinition, TriggerKey};
use crate::engine::{Engine, EngineError, EngineMetaData, LocalEngine};
use crate::error::{ErrorKind, ServiceError};
use crate::loader::{self, LoadReport};

/// Property key controlling whether `init()` also starts the engine.
pub const AUTO_START_KEY: &str = "quartzite.schedulerService.autoStart";

/// Property key controlling whether `shutdown()` waits for in-flight jobs.
pub const WAIT_FOR_JOBS_KEY: &str = "quartzite.schedulerService.waitForJobsToComplete";

/// Lifecycle state of a scheduler service, derived from the engine it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerServiceState {
    /// No engine held; `init()` has not run (or `destroy()` has).
    Uninitialized,
    /// Engine held but not firing triggers.
    Standby,
    /// Engine firing triggers.
    Running,
    /// Engine shut down; the service must be re-initialized.
    ShutDown,
}

struct Inner {
    engine: Option<Arc<dyn Engine>>,
    name: Option<String>,
    config: Option<ServiceConfig>,
    auto_start: bool,
    wait_for_jobs: bool,
}

/// Management facade over one scheduling engine.
pub struct SchedulerService {
    inner: Mutex<Inner>,
}

impl fmt::Debug for SchedulerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SchedulerService");
        match self.inner.try_lock() {
            Ok(inner) => s
                .field("name", &inner.name)
                .field("has_engine", &inner.engine.is_some())
                .field("auto_start", &inner.auto_start)
                .field("wait_for_jobs", &inner.wait_for_jobs)
                .finish(),
            Err(_) => s.finish_non_exhaustive(),
        }
    }
}

impl SchedulerService {
    /// A service with no engine and no configuration. `init()` will fail
    /// with [`ErrorKind::ConfigurationMissing`] until one of them is given.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                engine: None,
                name: None,
                config: None,
                auto_start: true,
                wait_for_jobs: true,
            }),
        }
    }

    /// A service wrapping a pre-supplied engine instance. `init()` skips
    /// engine construction.
    pub fn with_engine(engine: Arc<dyn Engine>) -> Self {
        let service = Self::new();
        service
            .inner
            .lock()
            .expect("scheduler service state poisoned")
            .engine = Some(engine);
        service
    }

    /// A service that will construct a [`LocalEngine`] from the given
    /// properties at `init()` time.
    pub fn with_config(config: ServiceConfig) -> Self {
        let service = Self::new();
        service
            .inner
            .lock()
            .expect("scheduler service state poisoned")
            .config = Some(config);
        service
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("scheduler service state poisoned")
    }

    /// The engine, or a failure when the service is not initialized.
    fn engine(&self) -> Result<Arc<dyn Engine>, ServiceError> {
        self.lock().engine.clone().ok_or_else(|| {
            ServiceError::scheduler_problem("scheduler service holds no engine; call init() first")
        })
    }

    /// Initialize the service, constructing the engine from configuration
    /// when none was pre-supplied, and auto-start it unless disabled or the
    /// engine is remote. Auto-starting a remote engine is refused; it may
    /// be shared and managed elsewhere.
    pub fn init(&self) -> Result<(), ServiceError> {
        let mut inner = self.lock();

        if inner.engine.is_none() {
            let config = inner.config.clone().ok_or_else(|| {
                ServiceError::new(
                    ErrorKind::ConfigurationMissing,
                    "scheduler service has no engine and no configuration properties",
                )
            })?;
            let engine = LocalEngine::from_properties(&config).map_err(|e| {
                ServiceError::scheduler_problem("failed to construct engine from configuration")
                    .with_source(e)
            })?;
            inner.auto_start = config.get_bool(AUTO_START_KEY, true);
            inner.wait_for_jobs = config.get_bool(WAIT_FOR_JOBS_KEY, true);
            inner.engine = Some(Arc::new(engine));
        }

        let Some(engine) = inner.engine.clone() else {
            return Err(ServiceError::scheduler_problem(
                "engine unavailable after initialization",
            ));
        };

        let name = engine
            .name()
            .map_err(|e| wrap("failed to read engine name", e))?;
        inner.name = Some(name.clone());
        info!(
            scheduler = %name,
            auto_start = inner.auto_start,
            "scheduler service initialized"
        );

        let remote = engine
            .metadata()
            .map_err(|e| wrap("failed to read engine metadata", e))?
            .remote;
        if remote && inner.auto_start {
            info!(scheduler = %name, "auto start of a remote engine is skipped");
            inner.auto_start = false;
        }

        let auto_start = inner.auto_start;
        drop(inner);

        if auto_start {
            self.start()?;
        }
        Ok(())
    }

    /// Release the engine, shutting it down first unless it is remote
    /// (stopping a shared remote engine would be destructive to its other
    /// users). Afterwards operations fail until the service is
    /// re-initialized.
    pub fn destroy(&self) -> Result<(), ServiceError> {
        let (engine, wait_for_jobs) = {
            let mut inner = self.lock();
            (inner.engine.take(), inner.wait_for_jobs)
        };

        let Some(engine) = engine else {
            return Ok(());
        };

        let remote = engine
            .metadata()
            .map_err(|e| wrap("failed to read engine metadata", e))?
            .remote;
        if remote {
            info!("shutdown of a remote engine is skipped");
        } else if !engine
            .is_shutdown()
            .map_err(|e| wrap("failed to query engine state", e))?
        {
            engine
                .shutdown(wait_for_jobs)
                .map_err(|e| wrap("failed to shut down engine", e))?;
            info!(wait_for_jobs, "engine stopped");
        }

        info!(scheduler = self.name().as_deref().unwrap_or("unnamed"), "scheduler service destroyed");
        Ok(())
    }

    /// Start firing triggers. No-op when already running; also brings the
    /// engine out of standby. Jobs can be added and removed before this is
    /// called, they just will not fire.
    pub fn start(&self) -> Result<(), ServiceError> {
        let engine = self.engine()?;

        let started = engine
            .is_started()
            .map_err(|e| wrap("failed to query engine state", e))?;
        let standby = engine
            .is_in_standby()
            .map_err(|e| wrap("failed to query engine state", e))?;

        if !started || standby {
            engine
                .start()
                .map_err(|e| wrap("failed to start engine", e))?;
            info!(scheduler = self.name().as_deref().unwrap_or("unnamed"), "scheduler started");
        }
        Ok(())
    }

    /// Place the engine in standby. No-op when already in standby.
    pub fn pause(&self) -> Result<(), ServiceError> {
        let engine = self.engine()?;

        let standby = engine
            .is_in_standby()
            .map_err(|e| wrap("failed to query engine state", e))?;
        if !standby {
            engine
                .standby()
                .map_err(|e| wrap("failed to pause engine", e))?;
            info!(scheduler = self.name().as_deref().unwrap_or("unnamed"), "scheduler paused");
        }
        Ok(())
    }

    /// Leave standby and resume firing. No-op when not in standby.
    pub fn resume(&self) -> Result<(), ServiceError> {
        let engine = self.engine()?;

        let standby = engine
            .is_in_standby()
            .map_err(|e| wrap("failed to query engine state", e))?;
        if standby {
            engine
                .start()
                .map_err(|e| wrap("failed to resume engine", e))?;
            info!(scheduler = self.name().as_deref().unwrap_or("unnamed"), "scheduler resumed");
        }
        Ok(())
    }

    /// Shut the engine down completely, honoring the wait-for-jobs flag.
    /// No-op when already shut down. The service must be re-initialized
    /// before it can start again.
    pub fn shutdown(&self) -> Result<(), ServiceError> {
        let engine = self.engine()?;
        let wait_for_jobs = self.lock().wait_for_jobs;

        let already = engine
            .is_shutdown()
            .map_err(|e| wrap("failed to query engine state", e))?;
        if !already {
            engine
                .shutdown(wait_for_jobs)
                .map_err(|e| wrap("failed to shut down engine", e))?;
            info!(
                scheduler = self.name().as_deref().unwrap_or("unnamed"),
                wait_for_jobs,
                "scheduler stopped"
            );
        }
        Ok(())
    }

    /// Whether triggers are actually firing: started and not in standby.
    pub fn is_job_running(&self) -> Result<bool, ServiceError> {
        let engine = self.engine()?;
        let started = engine
            .is_started()
            .map_err(|e| wrap("failed to query engine state", e))?;
        let standby = engine
            .is_in_standby()
            .map_err(|e| wrap("failed to query engine state", e))?;
        Ok(started && !standby)
    }

    /// The derived lifecycle state.
    pub fn state(&self) -> Result<SchedulerServiceState, ServiceError> {
        let engine = {
            let inner = self.lock();
            match inner.engine.clone() {
                Some(engine) => engine,
                None => return Ok(SchedulerServiceState::Uninitialized),
            }
        };

        let meta = engine
            .metadata()
            .map_err(|e| wrap("failed to read engine metadata", e))?;
        Ok(if meta.shut_down {
            SchedulerServiceState::ShutDown
        } else if meta.started && !meta.in_standby {
            SchedulerServiceState::Running
        } else {
            SchedulerServiceState::Standby
        })
    }

    /// Register a job with its initial trigger. Returns the first fire
    /// time.
    pub fn schedule_job(
        &self,
        job: JobDefinition,
        trigger: TriggerDefinition,
    ) -> Result<DateTime<Utc>, ServiceError> {
        let engine = self.engine()?;
        let job_key = job.key().clone();
        let trigger_key = trigger.key().clone();

        let next = engine.schedule_job(job, trigger).map_err(|e| {
            wrap(
                format!("failed to schedule job {} with trigger {}", job_key, trigger_key),
                e,
            )
        })?;
        info!(job = %job_key, trigger = %trigger_key, "scheduled job");
        Ok(next)
    }

    /// Attach a new trigger to an existing job (the trigger names the job
    /// it fires). Fails when the referenced job does not exist. Returns the
    /// first fire time.
    pub fn schedule_trigger(
        &self,
        trigger: TriggerDefinition,
    ) -> Result<DateTime<Utc>, ServiceError> {
        let engine = self.engine()?;
        let trigger_key = trigger.key().clone();
        let job_key = trigger.job().clone();

        let next = engine.schedule_trigger(trigger).map_err(|e| {
            wrap(
                format!("failed to schedule trigger {} for job {}", trigger_key, job_key),
                e,
            )
        })?;
        info!(trigger = %trigger_key, job = %job_key, "scheduled trigger");
        Ok(next)
    }

    /// Remove one trigger, returning it for inspection. The engine removes
    /// the trigger's job as well when it is non-durable and has no other
    /// triggers left.
    pub fn unschedule_job(&self, key: &TriggerKey) -> Result<TriggerDefinition, ServiceError> {
        let engine = self.engine()?;

        let trigger = engine
            .trigger(key)
            .map_err(|e| wrap(format!("failed to look up trigger {}", key), e))?;
        let removed = engine
            .unschedule_job(key)
            .map_err(|e| wrap(format!("failed to unschedule trigger {}", key), e))?;

        let trigger = match (removed, trigger) {
            (true, Some(trigger)) => trigger,
            _ => {
                return Err(ServiceError::scheduler_problem(format!(
                    "failed to unschedule job: no trigger matched name={} group={}",
                    key.name(),
                    key.group()
                )));
            }
        };

        info!(trigger = %key, job = %trigger.job(), "unscheduled job");
        Ok(trigger)
    }

    /// Remove a job and every trigger referencing it, returning the removed
    /// triggers.
    pub fn delete_job(&self, key: &JobKey) -> Result<Vec<TriggerDefinition>, ServiceError> {
        let engine = self.engine()?;

        let triggers = engine
            .triggers_of_job(key)
            .map_err(|e| wrap(format!("failed to list triggers of job {}", key), e))?;
        let deleted = engine
            .delete_job(key)
            .map_err(|e| wrap(format!("failed to delete job {}", key), e))?;
        if !deleted {
            return Err(ServiceError::scheduler_problem(format!(
                "failed to delete job: no job matched name={} group={}",
                key.name(),
                key.group()
            )));
        }

        info!(job = %key, removed_triggers = triggers.len(), "deleted job");
        Ok(triggers)
    }

    /// All jobs currently registered, enumerated group by group.
    pub fn get_job_details(&self) -> Result<Vec<JobDefinition>, ServiceError> {
        let engine = self.engine()?;

        let mut jobs = Vec::new();
        let groups = engine
            .job_group_names()
            .map_err(|e| wrap("failed to list job groups", e))?;
        for group in groups {
            let names = engine
                .job_names(&group)
                .map_err(|e| wrap(format!("failed to list jobs in group {}", group), e))?;
            for name in names {
                let key = JobKey::new(name, group.clone());
                let detail = engine
                    .job_detail(&key)
                    .map_err(|e| wrap(format!("failed to look up job {}", key), e))?;
                if let Some(job) = detail {
                    jobs.push(job);
                }
            }
        }
        Ok(jobs)
    }

    /// Look up one job.
    pub fn get_job_detail(&self, key: &JobKey) -> Result<Option<JobDefinition>, ServiceError> {
        let engine = self.engine()?;
        engine
            .job_detail(key)
            .map_err(|e| wrap(format!("failed to look up job {}", key), e))
    }

    /// Look up one trigger.
    pub fn get_trigger(&self, key: &TriggerKey) -> Result<Option<TriggerDefinition>, ServiceError> {
        let engine = self.engine()?;
        engine
            .trigger(key)
            .map_err(|e| wrap(format!("failed to look up trigger {}", key), e))
    }

    /// All triggers referencing a job.
    pub fn get_triggers(&self, key: &JobKey) -> Result<Vec<TriggerDefinition>, ServiceError> {
        let engine = self.engine()?;
        engine
            .triggers_of_job(key)
            .map_err(|e| wrap(format!("failed to list triggers of job {}", key), e))
    }

    /// Project up to `max_count` fire times strictly after `start`, feeding
    /// each result back as the next query point. When the rule dries up
    /// before `max_count`, [`FireTime::Exhausted`] is appended as the final
    /// element and the sequence ends early; check for it instead of
    /// assuming `max_count` entries.
    pub fn next_fire_times(
        trigger: &TriggerDefinition,
        start: DateTime<Utc>,
        max_count: usize,
    ) -> Vec<FireTime> {
        let mut times = Vec::with_capacity(max_count.min(64));
        let mut cursor = start;
        for _ in 0..max_count {
            match trigger.fire_time_after(cursor) {
                Some(t) => {
                    times.push(FireTime::At(t));
                    cursor = t;
                }
                None => {
                    times.push(FireTime::Exhausted);
                    break;
                }
            }
        }
        times
    }

    /// Load a declarative job document and register its contents against
    /// this service's engine. Any parse or registration failure is wrapped
    /// as a scheduler problem.
    pub fn load_jobs(&self, document: &str) -> Result<LoadReport, ServiceError> {
        let engine = self.engine()?;
        let report = loader::load_str(document, engine.as_ref()).map_err(|e| {
            ServiceError::scheduler_problem("failed to load job document").with_source(e)
        })?;
        info!(
            jobs = report.jobs().len(),
            triggers = report.triggers().len(),
            "job document loaded"
        );
        Ok(report)
    }

    /// Engine identity and state snapshot.
    pub fn metadata(&self) -> Result<EngineMetaData, ServiceError> {
        let engine = self.engine()?;
        engine
            .metadata()
            .map_err(|e| wrap("failed to read engine metadata", e))
    }

    /// The engine's reported name.
    pub fn scheduler_name(&self) -> Result<String, ServiceError> {
        let engine = self.engine()?;
        engine
            .name()
            .map_err(|e| wrap("failed to read engine name", e))
    }

    /// Whether the engine executes in a separate process/host.
    pub fn is_remote(&self) -> Result<bool, ServiceError> {
        Ok(self.metadata()?.remote)
    }

    /// The underlying engine, for callers that need the raw seam.
    pub fn underlying_engine(&self) -> Result<Arc<dyn Engine>, ServiceError> {
        self.engine()
    }

    /// The service name; unset until `init()` completes.
    pub fn name(&self) -> Option<String> {
        self.lock().name.clone()
    }

    /// Whether `init()` starts the engine.
    pub fn auto_start(&self) -> bool {
        self.lock().auto_start
    }

    /// Whether `shutdown()` waits for in-flight jobs to complete.
    pub fn wait_for_jobs_to_complete(&self) -> bool {
        self.lock().wait_for_jobs
    }
}

impl Default for SchedulerService {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchedulerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "SchedulerService[{}]", name),
            None => write!(f, "SchedulerService[uninitialized]"),
        }
    }
}

fn wrap(message: impl Into<String>, source: EngineError) -> ServiceError {
    ServiceError::scheduler_problem(message).with_source(source)
}
