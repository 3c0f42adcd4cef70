//! External-command job payload.
//!
//! [`CommandRunner`] wraps a program invocation so shell commands and
//! external executables can be used as job payloads.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};

use super::job::{JobContext, JobRunError, JobRunner};

/// A job payload that runs an external command.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl CommandRunner {
    /// Start building a command payload for the given program.
    pub fn builder(program: impl Into<String>) -> CommandRunnerBuilder {
        CommandRunnerBuilder {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
        }
    }

    /// The program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The configured arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl JobRunner for CommandRunner {
    fn run(&self, ctx: &JobContext) -> Result<(), JobRunError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        debug!(job = %ctx.job, program = %self.program, "running command payload");

        let output = command.output()?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                warn!(job = %ctx.job, program = %self.program, "command stderr: {}", stderr);
            }
            Err(JobRunError::Failed(format!(
                "command '{}' exited with {}",
                self.program, output.status
            )))
        }
    }
}

/// Builder for [`CommandRunner`].
pub struct CommandRunnerBuilder {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl CommandRunnerBuilder {
    /// Add one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the subprocess.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build the runner.
    pub fn build(self) -> CommandRunner {
        CommandRunner {
            program: self.program,
            args: self.args,
            working_dir: self.working_dir,
            env: self.env,
        }
    }
}
