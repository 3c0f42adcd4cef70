//! Scripting-evaluator contract.
//!
//! The evaluator itself lives outside this crate; the trait only pins down
//! the calling convention. Note the error asymmetry between the two entry
//! points: [`run`](ScriptingService::run) hands back the evaluator's own
//! error untouched, while [`run_script`](ScriptingService::run_script)
//! wraps both read and evaluation failures into
//! [`ErrorKind::ScriptingProblem`](crate::error::ErrorKind::ScriptingProblem).

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::ServiceError;

/// Variables bound into a script evaluation.
pub type ScriptVariables = HashMap<String, Value>;

/// An expression evaluator consumed by value-add tooling.
pub trait ScriptingService: Send + Sync {
    /// Evaluate script text with the given variables bound. Evaluation
    /// errors propagate as the evaluator's own error type.
    fn run(
        &self,
        script: &str,
        variables: &ScriptVariables,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>>;

    /// Read a script file and evaluate it. Read and evaluation failures
    /// both surface as
    /// [`ErrorKind::ScriptingProblem`](crate::error::ErrorKind::ScriptingProblem).
    fn run_script(
        &self,
        path: &Path,
        variables: &ScriptVariables,
    ) -> Result<Value, ServiceError> {
        let script = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::scripting_problem(format!(
                "failed to read script file {}",
                path.display()
            ))
            .with_source(e)
        })?;
        self.run(&script, variables).map_err(|e| {
            ServiceError::scripting_problem(format!(
                "script file {} failed to evaluate",
                path.display()
            ))
            .with_source(ScriptEvaluationError(e))
        })
    }

    /// Lifecycle hook called before first use.
    fn init(&self) {}

    /// Lifecycle hook called when the service is discarded.
    fn destroy(&self) {}
}

/// Adapter keeping a boxed evaluator error usable as an error source.
#[derive(Debug)]
struct ScriptEvaluationError(Box<dyn std::error::Error + Send + Sync>);

impl std::fmt::Display for ScriptEvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ScriptEvaluationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}
