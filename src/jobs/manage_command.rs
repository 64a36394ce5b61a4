use std::{
    collections::HashMap,
    io,
    path::Path,
    process::{ExitStatus, Stdio},
};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;

use super::{job_descriptor::JobDescriptor, JobInvoker};

/// Runs jobs as management commands of the external application, e.g.
/// `python manage.py backup_operations_db --db-path /data/operations.db`.
#[derive(Debug, Clone)]
pub struct ManageCommandInvoker {
    program: String,
    program_args: Vec<String>,
    capture_output: bool,
}

impl ManageCommandInvoker {
    #[must_use]
    pub fn new(program: impl Into<String>, program_args: Vec<String>, capture_output: bool) -> Self {
        Self {
            program: program.into(),
            program_args,
            capture_output,
        }
    }

    #[must_use]
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.program_args.clone(),
            config.capture_output,
        )
    }
}

impl JobInvoker for ManageCommandInvoker {
    async fn invoke(
        &self,
        descriptor: &JobDescriptor,
        arguments: &[String],
        env: &HashMap<String, String>,
        working_dir: Option<&Path>,
    ) -> Result<i32, io::Error> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.program_args)
            .arg(descriptor.command)
            .args(arguments)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null());

        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        debug!(
            "Spawning {} {} {} {}",
            self.program,
            self.program_args.join(" "),
            descriptor.command,
            arguments.join(" ")
        );

        if !self.capture_output {
            let status = command.status().await?;
            return Ok(exit_status_code(status));
        }

        let output = command.output().await?;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(job = descriptor.name, stream = "stdout", "{}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            warn!(job = descriptor.name, stream = "stderr", "{}", line);
        }
        Ok(exit_status_code(output.status))
    }
}

/// Shell convention: a child killed by signal N reports `128 + N`.
fn exit_status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
