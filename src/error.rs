//! Service-layer error taxonomy.
//!
//! Every failure that crosses the service boundary is a [`ServiceError`]
//! tagged with an [`ErrorKind`]. Engine-native errors are never surfaced
//! directly; they travel as the wrapped source so diagnostics keep the
//! original failure.

use std::fmt;

use thiserror::Error;

/// Closed set of failure kinds surfaced by this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Any failure reported by the underlying engine during a lifecycle,
    /// query, or mutation call.
    SchedulerProblem,
    /// `init()` was invoked without a pre-supplied engine and without
    /// configuration properties.
    ConfigurationMissing,
    /// Failure during file-based script evaluation.
    ScriptingProblem,
    /// A registry name is already taken.
    DuplicateName,
    /// A registry or session lookup found nothing.
    NotFound,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::SchedulerProblem => "scheduler problem",
            ErrorKind::ConfigurationMissing => "configuration missing",
            ErrorKind::ScriptingProblem => "scripting problem",
            ErrorKind::DuplicateName => "duplicate name",
            ErrorKind::NotFound => "not found",
        };
        f.write_str(label)
    }
}

/// A failure kind plus context, optionally wrapping the underlying cause.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServiceError {
    /// Create an error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for a [`ErrorKind::SchedulerProblem`] error.
    pub fn scheduler_problem(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchedulerProblem, message)
    }

    /// Shorthand for a [`ErrorKind::ScriptingProblem`] error.
    pub fn scripting_problem(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ScriptingProblem, message)
    }

    /// The failure kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The context message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
