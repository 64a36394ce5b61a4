use crate::{
    config::Config,
    jobs::{job_registry::JobRegistry, job_result::JobOutcome},
    run_environment::EnvMap,
};

use super::run::build_runner;

/// Validates a job's preconditions without taking the lock or running it.
pub fn handle_check_command(
    config: &Config,
    registry: JobRegistry,
    job: &str,
    overrides: EnvMap,
) -> i32 {
    let runner = build_runner(config, registry);
    let context = runner.check(job, &overrides);

    match &context.outcome {
        Some(outcome @ JobOutcome::Failed { .. }) => eprintln!("❌ {job}: {outcome}"),
        _ => {
            println!("✅ {job}: ready to run");
            if let Some(path) = &context.database_path {
                println!("🗄️  database: {}", path.display());
                println!(
                    "🔒 lock file: {}",
                    runner.lock().lock_path(&path.to_string_lossy()).display()
                );
            }
        }
    }

    context.exit_code()
}
