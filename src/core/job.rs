//! Job definitions and the runner payload seam.
//!
//! A [`JobDefinition`] names a unit of work and carries its behavior as an
//! opaque [`JobRunner`]. Durable jobs survive losing their last trigger;
//! non-durable jobs are removed by the engine along with it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use super::types::{ExecutionId, JobKey, TriggerKey};

/// Errors a job payload can fail with.
#[derive(Debug, Error)]
pub enum JobRunError {
    /// The payload ran and reported failure.
    #[error("job execution failed: {0}")]
    Failed(String),

    /// The payload could not be started.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Execution-time context handed to a [`JobRunner`].
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Identifier of this execution.
    pub execution_id: ExecutionId,
    /// The job being executed.
    pub job: JobKey,
    /// The trigger that fired.
    pub trigger: TriggerKey,
    /// The fire time the execution was scheduled for.
    pub scheduled_time: DateTime<Utc>,
    /// The job's data map.
    pub data: HashMap<String, Value>,
}

/// The behavior payload of a job.
///
/// Implementations must be safe to invoke from the engine's execution
/// threads; a single runner instance may be running concurrently for
/// overlapping fire times.
pub trait JobRunner: Send + Sync {
    /// Execute the job once.
    fn run(&self, ctx: &JobContext) -> Result<(), JobRunError>;
}

/// A named, grouped unit of work registered with an engine.
#[derive(Clone)]
pub struct JobDefinition {
    key: JobKey,
    runner: Arc<dyn JobRunner>,
    durable: bool,
    description: Option<String>,
    data: HashMap<String, Value>,
}

impl fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDefinition")
            .field("key", &self.key)
            .field("durable", &self.durable)
            .field("description", &self.description)
            .field("data_keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl JobDefinition {
    /// Create a non-durable job with the given key and payload.
    pub fn new(key: JobKey, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            key,
            runner,
            durable: false,
            description: None,
            data: HashMap::new(),
        }
    }

    /// Mark the job durable. A durable job stays registered after its last
    /// trigger is removed.
    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a data map entry.
    pub fn with_data_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// The job identity.
    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// The behavior payload.
    pub fn runner(&self) -> &Arc<dyn JobRunner> {
        &self.runner
    }

    /// Whether the job survives losing its last trigger.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// The description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The job data map.
    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }
}
