//! Trigger definitions and fire-time computation.
//!
//! A trigger binds a [`FireRule`] to exactly one job, optionally bounded by
//! start and end times. The start bound is itself the first fire of an
//! interval rule; no fire ever lands strictly after the end bound.

use chrono::{DateTime, Utc};

use super::rule::FireRule;
use super::types::{JobKey, TriggerKey};

/// One projected fire time, or the explicit end of the sequence.
///
/// `Exhausted` means the rule has no further occurrences (end bound passed
/// or the rule itself dried up), as opposed to a projection that simply
/// stopped at its requested length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireTime {
    /// The trigger fires at this instant.
    At(DateTime<Utc>),
    /// No further fire times exist.
    Exhausted,
}

impl FireTime {
    /// The instant, if this is a concrete fire time.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            FireTime::At(t) => Some(*t),
            FireTime::Exhausted => None,
        }
    }

    /// Whether this marks the end of the sequence.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, FireTime::Exhausted)
    }
}

/// A named, grouped fire-time rule bound to one job.
#[derive(Debug, Clone)]
pub struct TriggerDefinition {
    key: TriggerKey,
    job: JobKey,
    rule: FireRule,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    description: Option<String>,
}

impl TriggerDefinition {
    /// Create an unbounded trigger for the given job.
    pub fn new(key: TriggerKey, job: JobKey, rule: FireRule) -> Self {
        Self {
            key,
            job,
            rule,
            start_at: None,
            end_at: None,
            description: None,
        }
    }

    /// Set the start bound. Interval rules anchor their sequence here and
    /// fire at the bound itself first.
    pub fn with_start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Set the end bound (inclusive); no fire time past it is produced.
    pub fn with_end_at(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The trigger identity.
    pub fn key(&self) -> &TriggerKey {
        &self.key
    }

    /// The job this trigger fires.
    pub fn job(&self) -> &JobKey {
        &self.job
    }

    /// The recurrence rule.
    pub fn rule(&self) -> &FireRule {
        &self.rule
    }

    /// The start bound, if any.
    pub fn start_at(&self) -> Option<DateTime<Utc>> {
        self.start_at
    }

    /// The end bound, if any.
    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        self.end_at
    }

    /// The description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The next fire time strictly after `after`, honoring both bounds.
    /// `None` means the trigger will never fire again.
    pub fn fire_time_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(end) = self.end_at {
            if after >= end {
                return None;
            }
        }

        let next = match self.start_at {
            Some(start) => {
                if self.rule.is_interval() {
                    self.rule.next_after_anchored(start, after)
                } else if after < start {
                    // First cron occurrence at or after the start bound.
                    self.rule.next_after(start - chrono::Duration::seconds(1))
                } else {
                    self.rule.next_after(after)
                }
            }
            None => self.rule.next_after(after),
        }?;

        match self.end_at {
            Some(end) if next > end => None,
            _ => Some(next),
        }
    }
}
