//! Job, trigger, and fire-rule model shared by the engine and service layers.

pub mod command;
pub mod job;
pub mod rule;
pub mod trigger;
pub mod types;

pub use command::CommandRunner;
pub use job::{JobContext, JobDefinition, JobRunError, JobRunner};
pub use rule::{FireRule, RuleError};
pub use trigger::{FireTime, TriggerDefinition};
pub use types::{ExecutionId, JobKey, TriggerKey, DEFAULT_GROUP};
