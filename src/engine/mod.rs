//! The scheduling-engine seam.
//!
//! [`Engine`] is the boundary to the subsystem that actually tracks due
//! times and invokes job payloads. The service layer only talks through
//! this trait; [`LocalEngine`] is the in-process implementation, and remote
//! engines are only ever observed through [`EngineMetaData::remote`].

mod local;

pub use local::{LocalEngine, INSTANCE_NAME_KEY, TICK_MILLIS_KEY};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::{JobDefinition, JobKey, TriggerDefinition, TriggerKey};

/// Errors reported by an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No job registered under the key.
    #[error("job not found: {0}")]
    JobNotFound(JobKey),

    /// No trigger registered under the key.
    #[error("trigger not found: {0}")]
    TriggerNotFound(TriggerKey),

    /// A job with this key is already registered.
    #[error("duplicate job: {0}")]
    DuplicateJob(JobKey),

    /// A trigger with this key is already registered.
    #[error("duplicate trigger: {0}")]
    DuplicateTrigger(TriggerKey),

    /// The trigger has no future fire time at registration.
    #[error("trigger {0} will never fire")]
    NeverFires(TriggerKey),

    /// A trigger-less job must be durable to be stored.
    #[error("job {0} is not durable and has no trigger")]
    NotDurable(JobKey),

    /// The engine has been shut down.
    #[error("engine is shut down")]
    ShutDown,

    /// Anything else the engine wants to report.
    #[error("engine failure: {0}")]
    Internal(String),
}

/// A point-in-time snapshot of engine identity and state.
#[derive(Debug, Clone)]
pub struct EngineMetaData {
    /// Engine instance name.
    pub name: String,
    /// Whether `start()` has been called and the engine was not shut down.
    pub started: bool,
    /// Whether the engine is initialized but holding fire.
    pub in_standby: bool,
    /// Whether the engine has been shut down.
    pub shut_down: bool,
    /// Whether execution happens in a separate process/host behind a proxy.
    pub remote: bool,
    /// Number of job executions fired so far.
    pub jobs_executed: u64,
}

/// The underlying timer/dispatch subsystem.
///
/// Implementations are responsible for their own thread safety: job and
/// trigger mutation may be invoked from multiple threads holding the same
/// engine reference.
pub trait Engine: Send + Sync {
    /// The engine instance name.
    fn name(&self) -> Result<String, EngineError>;

    /// Snapshot of identity and state.
    fn metadata(&self) -> Result<EngineMetaData, EngineError>;

    /// Whether `start()` has been called and the engine was not shut down.
    fn is_started(&self) -> Result<bool, EngineError>;

    /// Whether the engine is in standby.
    fn is_in_standby(&self) -> Result<bool, EngineError>;

    /// Whether the engine has been shut down.
    fn is_shutdown(&self) -> Result<bool, EngineError>;

    /// Begin (or leave standby and resume) firing triggers.
    fn start(&self) -> Result<(), EngineError>;

    /// Stop firing triggers without shutting down.
    fn standby(&self) -> Result<(), EngineError>;

    /// Shut down permanently. With `wait_for_jobs` the call blocks until
    /// in-flight executions complete.
    fn shutdown(&self, wait_for_jobs: bool) -> Result<(), EngineError>;

    /// Store a durable job with no trigger.
    fn add_job(&self, job: JobDefinition) -> Result<(), EngineError>;

    /// Register a job together with its initial trigger. Returns the first
    /// fire time.
    fn schedule_job(
        &self,
        job: JobDefinition,
        trigger: TriggerDefinition,
    ) -> Result<DateTime<Utc>, EngineError>;

    /// Attach a trigger to an existing job. Returns the first fire time.
    fn schedule_trigger(&self, trigger: TriggerDefinition) -> Result<DateTime<Utc>, EngineError>;

    /// Remove one trigger. Returns `false` when nothing matched. Removing
    /// the last trigger of a non-durable job removes the job as well.
    fn unschedule_job(&self, key: &TriggerKey) -> Result<bool, EngineError>;

    /// Remove a job and all triggers referencing it. Returns `false` when
    /// no job matched.
    fn delete_job(&self, key: &JobKey) -> Result<bool, EngineError>;

    /// All job groups with at least one job.
    fn job_group_names(&self) -> Result<Vec<String>, EngineError>;

    /// All job names within a group.
    fn job_names(&self, group: &str) -> Result<Vec<String>, EngineError>;

    /// Look up a job definition.
    fn job_detail(&self, key: &JobKey) -> Result<Option<JobDefinition>, EngineError>;

    /// Look up a trigger definition.
    fn trigger(&self, key: &TriggerKey) -> Result<Option<TriggerDefinition>, EngineError>;

    /// All triggers referencing a job.
    fn triggers_of_job(&self, key: &JobKey) -> Result<Vec<TriggerDefinition>, EngineError>;
}
