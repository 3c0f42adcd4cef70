//! Identifier types for jobs, triggers, and executions.
//!
//! Jobs and triggers are identified by a (name, group) pair, unique per
//! engine instance. The group defaults to [`DEFAULT_GROUP`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Group assigned when none is given.
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Identity of a job within an engine instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobKey {
    group: String,
    name: String,
}

/// Identity of a trigger within an engine instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TriggerKey {
    group: String,
    name: String,
}

/// Unique identifier for a single job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionId(Uuid);

impl JobKey {
    /// Create a key with an explicit group.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Create a key in the default group.
    pub fn with_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }

    /// The job name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The job group.
    pub fn group(&self) -> &str {
        &self.group
    }
}

impl TriggerKey {
    /// Create a key with an explicit group.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Create a key in the default group.
    pub fn with_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }

    /// The trigger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The trigger group.
    pub fn group(&self) -> &str {
        &self.group
    }
}

impl ExecutionId {
    /// Generate a new random execution id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
