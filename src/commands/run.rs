use tracing::debug;

use crate::{
    config::Config,
    jobs::{
        job_registry::JobRegistry, job_result::JobOutcome, job_runner::JobRunner,
        manage_command::ManageCommandInvoker, run_lock::RunLock,
    },
    run_environment::{EnvMap, RunEnvironment},
};

/// Runner wired to the real process environment and management commands.
#[must_use]
pub fn build_runner(config: &Config, registry: JobRegistry) -> JobRunner<ManageCommandInvoker> {
    let environment = RunEnvironment::from_process(config.runner.override_file.clone());

    debug!(
        "Runner: lock dir {}, override file {}",
        config.runner.lock_dir.display(),
        environment
            .override_file()
            .map_or_else(|| "(none)".to_string(), |p| p.display().to_string())
    );

    JobRunner::new(
        registry,
        environment,
        config.database.clone(),
        RunLock::new(&config.runner.lock_dir),
        config.runner.working_dir.clone(),
        ManageCommandInvoker::from_config(&config.runner),
    )
}

/// Runs one job and returns the process exit code.
pub async fn handle_run_command(
    config: &Config,
    registry: JobRegistry,
    job: &str,
    overrides: EnvMap,
) -> i32 {
    let runner = build_runner(config, registry);
    let context = runner.run(job, &overrides).await;

    if let Some(outcome @ JobOutcome::Failed { .. }) = &context.outcome {
        eprintln!("❌ {job}: {outcome}");
    }

    context.exit_code()
}
