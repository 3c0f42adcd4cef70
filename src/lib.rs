//! quartzite - a management layer over a job-scheduling engine.
//!
//! The engine itself (the thing that tracks due times and invokes job
//! payloads) sits behind the [`Engine`] trait; [`LocalEngine`] is the
//! in-process implementation. On top of it, [`SchedulerService`] mediates
//! lifecycle and job/trigger operations, [`SchedulerServiceContainer`]
//! keeps named services with coordinated lifecycle, and
//! [`SchedulerServiceFinder`] resolves the current scheduler for a caller
//! session.

pub mod config;
pub mod container;
pub mod core;
pub mod engine;
pub mod error;
pub mod loader;
pub mod scripting;
pub mod service;
pub mod session;
pub mod testing;

pub use config::{ConfigError, ServiceConfig};
pub use container::SchedulerServiceContainer;
pub use core::{
    CommandRunner, ExecutionId, FireRule, FireTime, JobContext, JobDefinition, JobKey,
    JobRunError, JobRunner, RuleError, TriggerDefinition, TriggerKey, DEFAULT_GROUP,
};
pub use engine::{Engine, EngineError, EngineMetaData, LocalEngine};
pub use error::{ErrorKind, ServiceError};
pub use loader::{JobsDocument, LoadError, LoadReport};
pub use scripting::{ScriptVariables, ScriptingService};
pub use service::{SchedulerService, SchedulerServiceState, AUTO_START_KEY, WAIT_FOR_JOBS_KEY};
pub use session::{SchedulerServiceFinder, SessionData, SessionKey};
