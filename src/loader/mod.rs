//! Declarative job-definition loading.
//!
//! A job document lists jobs (with command payloads) and triggers, and is
//! registered wholesale against an engine. The loader is also the record of
//! what it registered: [`load_str`] returns a [`LoadReport`] naming every
//! job and trigger it placed.
//!
//! ```yaml
//! jobs:
//!   - name: report
//!     group: etl
//!     durable: true
//!     command:
//!       program: ./run-report.sh
//!       args: ["--full"]
//! triggers:
//!   - name: nightly
//!     group: etl
//!     job: report
//!     job_group: etl
//!     schedule: "@daily"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::core::rule::RuleError;
use crate::core::types::DEFAULT_GROUP;
use crate::core::{
    CommandRunner, FireRule, JobDefinition, JobKey, TriggerDefinition, TriggerKey,
};
use crate::engine::{Engine, EngineError};

/// Errors that can occur while loading a job document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read the document file.
    #[error("failed to read job document: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid YAML for the expected shape.
    #[error("job document parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A trigger's schedule expression did not parse.
    #[error("invalid schedule for trigger {trigger}: {source}")]
    InvalidSchedule {
        /// The offending trigger.
        trigger: String,
        /// The parse failure.
        source: RuleError,
    },

    /// The document contradicts itself or the engine's requirements.
    #[error("invalid job document: {0}")]
    InvalidDefinition(String),

    /// The engine rejected a registration.
    #[error("engine rejected registration: {0}")]
    Engine(#[from] EngineError),
}

/// One job entry in a document.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    /// Job name.
    pub name: String,
    /// Job group.
    #[serde(default = "default_group")]
    pub group: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the job survives losing its last trigger.
    #[serde(default)]
    pub durable: bool,
    /// The command payload.
    pub command: CommandSpec,
    /// Job data map.
    #[serde(default)]
    pub data: HashMap<String, serde_yaml::Value>,
}

/// Command payload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSpec {
    /// Program to run.
    pub program: String,
    /// Program arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory.
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Environment variables for the subprocess.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// One trigger entry in a document.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerSpec {
    /// Trigger name.
    pub name: String,
    /// Trigger group.
    #[serde(default = "default_group")]
    pub group: String,
    /// Name of the job this trigger fires.
    pub job: String,
    /// Group of the job this trigger fires.
    #[serde(default = "default_group")]
    pub job_group: String,
    /// Schedule expression (cron, shortcut, or `@every` interval).
    pub schedule: String,
    /// Timezone for cron evaluation.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Optional start bound.
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    /// Optional end bound.
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

/// A parsed job document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsDocument {
    /// Jobs to register.
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
    /// Triggers to register.
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
}

/// What a load pass registered.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    jobs: Vec<JobKey>,
    triggers: Vec<TriggerKey>,
}

impl LoadReport {
    /// Keys of the jobs registered.
    pub fn jobs(&self) -> &[JobKey] {
        &self.jobs
    }

    /// Keys of the triggers registered.
    pub fn triggers(&self) -> &[TriggerKey] {
        &self.triggers
    }
}

/// Parse a document without registering anything.
pub fn parse(text: &str) -> Result<JobsDocument, LoadError> {
    Ok(serde_yaml::from_str(text)?)
}

/// Parse a document and register its jobs and triggers against `engine`.
///
/// Jobs are registered with their first document trigger via
/// `schedule_job`, remaining triggers attach via `schedule_trigger`, and
/// trigger-less jobs are stored with `add_job` (which requires them
/// durable). Triggers naming a job absent from the document attach to
/// whatever the engine already holds under that key.
pub fn load_str(text: &str, engine: &dyn Engine) -> Result<LoadReport, LoadError> {
    let document = parse(text)?;
    load_document(&document, engine)
}

/// Like [`load_str`], reading the document from a file.
pub fn load_file(path: impl AsRef<Path>, engine: &dyn Engine) -> Result<LoadReport, LoadError> {
    let text = std::fs::read_to_string(path)?;
    load_str(&text, engine)
}

/// Register an already-parsed document against `engine`.
pub fn load_document(
    document: &JobsDocument,
    engine: &dyn Engine,
) -> Result<LoadReport, LoadError> {
    let mut report = LoadReport::default();

    // Triggers grouped by the job key they fire, preserving document order.
    let mut triggers_by_job: HashMap<JobKey, Vec<TriggerDefinition>> = HashMap::new();
    let mut trigger_order: Vec<TriggerKey> = Vec::new();
    for spec in &document.triggers {
        let trigger = build_trigger(spec)?;
        trigger_order.push(trigger.key().clone());
        triggers_by_job
            .entry(trigger.job().clone())
            .or_default()
            .push(trigger);
    }

    for spec in &document.jobs {
        let job = build_job(spec)?;
        let key = job.key().clone();

        match triggers_by_job.remove(&key) {
            Some(mut triggers) => {
                let first = triggers.remove(0);
                debug!(job = %key, trigger = %first.key(), "registering job with initial trigger");
                engine.schedule_job(job, first)?;
                for trigger in triggers {
                    engine.schedule_trigger(trigger)?;
                }
            }
            None => {
                debug!(job = %key, "registering trigger-less job");
                engine.add_job(job)?;
            }
        }
        report.jobs.push(key);
    }

    // Whatever remains references jobs outside this document.
    for (_, triggers) in triggers_by_job {
        for trigger in triggers {
            engine.schedule_trigger(trigger)?;
        }
    }

    report.triggers = trigger_order;
    Ok(report)
}

fn build_job(spec: &JobSpec) -> Result<JobDefinition, LoadError> {
    let runner = {
        let mut builder = CommandRunner::builder(&spec.command.program)
            .args(spec.command.args.iter().cloned());
        if let Some(dir) = &spec.command.working_dir {
            builder = builder.working_dir(dir);
        }
        for (key, value) in &spec.command.env {
            builder = builder.env(key, value);
        }
        Arc::new(builder.build())
    };

    let mut job = JobDefinition::new(JobKey::new(&spec.name, &spec.group), runner)
        .with_durable(spec.durable);
    if let Some(description) = &spec.description {
        job = job.with_description(description);
    }
    for (key, value) in &spec.data {
        let json = serde_json::to_value(value).map_err(|e| {
            LoadError::InvalidDefinition(format!(
                "data value {} of job {} is not representable: {}",
                key, spec.name, e
            ))
        })?;
        job = job.with_data_value(key, json);
    }
    Ok(job)
}

fn build_trigger(spec: &TriggerSpec) -> Result<TriggerDefinition, LoadError> {
    let key = TriggerKey::new(&spec.name, &spec.group);
    let rule = match &spec.timezone {
        Some(tz) => FireRule::parse_in_timezone(&spec.schedule, tz),
        None => FireRule::parse(&spec.schedule),
    }
    .map_err(|source| LoadError::InvalidSchedule {
        trigger: key.to_string(),
        source,
    })?;

    let mut trigger =
        TriggerDefinition::new(key, JobKey::new(&spec.job, &spec.job_group), rule);
    if let Some(start_at) = spec.start_at {
        trigger = trigger.with_start_at(start_at);
    }
    if let Some(end_at) = spec.end_at {
        trigger = trigger.with_end_at(end_at);
    }
    if let Some(description) = &spec.description {
        trigger = trigger.with_description(description);
    }
    Ok(trigger)
}
