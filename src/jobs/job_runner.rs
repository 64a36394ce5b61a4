use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use strum::Display;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::DatabaseConfig,
    run_environment::{EnvMap, RunEnvironment},
};

use super::{
    environment_gate,
    job_descriptor::JobDescriptor,
    job_registry::JobRegistry,
    job_result::{FailureKind, JobOutcome},
    resource_path,
    run_lock::{LockError, LockMode, RunLock, RunLockGuard},
    JobInvoker,
};

/// Key under which the resolved database path is exposed to argument templates
pub const DATABASE_PATH_KEY: &str = "DB_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    Init,
    EnvValidated,
    PathResolved,
    LockAcquired,
    Invoking,
    Completed,
}

/// State of one invocation. Built fresh by every `run`, never persisted.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub job_name: String,
    pub state: RunState,
    pub resolved_env: EnvMap,
    pub database_path: Option<PathBuf>,
    pub arguments: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<JobOutcome>,
}

impl RunContext {
    fn new(job_name: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            state: RunState::Init,
            resolved_env: EnvMap::new(),
            database_path: None,
            arguments: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            outcome: None,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(next > self.state, "{} -> {}", self.state, next);
        debug!(
            "Run {} of '{}': {} -> {}",
            self.run_id, self.job_name, self.state, next
        );
        self.state = next;
    }

    fn complete(&mut self, outcome: JobOutcome) {
        if self.state == RunState::Completed {
            return;
        }
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
        self.outcome = Some(outcome);
    }

    /// Exit code for the process; zero until an outcome is recorded.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.outcome.as_ref().map_or(0, JobOutcome::exit_code)
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

/// Drives one job through gate, path checks, lock and invocation.
pub struct JobRunner<I> {
    registry: JobRegistry,
    environment: RunEnvironment,
    database: DatabaseConfig,
    lock: RunLock,
    working_dir: Option<PathBuf>,
    invoker: I,
}

impl<I: JobInvoker> JobRunner<I> {
    pub fn new(
        registry: JobRegistry,
        environment: RunEnvironment,
        database: DatabaseConfig,
        lock: RunLock,
        working_dir: Option<PathBuf>,
        invoker: I,
    ) -> Self {
        Self {
            registry,
            environment,
            database,
            lock,
            working_dir,
            invoker,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn lock(&self) -> &RunLock {
        &self.lock
    }

    /// Runs `job_name` to a terminal outcome.
    ///
    /// Nothing is retried here; a failed or skipped run is picked up again by
    /// the next timer tick.
    pub async fn run(&self, job_name: &str, overrides: &EnvMap) -> RunContext {
        let mut context = RunContext::new(job_name);
        info!("▶️  Starting job '{}' (run {})", job_name, context.run_id);

        let outcome = match self.prepare(&mut context, overrides) {
            Ok(descriptor) => self.execute(&mut context, descriptor).await,
            Err(outcome) => outcome,
        };

        finish(&mut context, outcome);
        context
    }

    /// Validates environment and database preconditions without taking the
    /// lock or invoking the job.
    pub fn check(&self, job_name: &str, overrides: &EnvMap) -> RunContext {
        let mut context = RunContext::new(job_name);

        let outcome = match self.prepare(&mut context, overrides) {
            Ok(_) => JobOutcome::Success,
            Err(outcome) => outcome,
        };

        finish(&mut context, outcome);
        context
    }

    /// `Init -> EnvValidated -> PathResolved`
    fn prepare(
        &self,
        context: &mut RunContext,
        overrides: &EnvMap,
    ) -> Result<&JobDescriptor, JobOutcome> {
        let Some(descriptor) = self.registry.get(&context.job_name) else {
            let mut known: Vec<_> = self.registry.job_names().collect();
            known.sort_unstable();
            return Err(JobOutcome::failed(
                FailureKind::UnknownJob,
                format!(
                    "no job named '{}' (known: {})",
                    context.job_name,
                    known.join(", ")
                ),
            ));
        };

        let merged = self
            .environment
            .merge(descriptor, overrides)
            .map_err(|e| JobOutcome::failed(FailureKind::ConfigUnreadable, e.to_string()))?;

        debug!(
            "🔎 Checking required keys for '{}': {}",
            descriptor.name,
            descriptor.required_env.join(", ")
        );

        context.resolved_env = environment_gate::check(descriptor.required_env, merged)
            .map_err(|e| JobOutcome::failed(FailureKind::MissingEnv, e.keys.join(", ")))?;
        context.advance(RunState::EnvValidated);

        if descriptor.requires_database {
            let path = self.resolve_database_path(&context.resolved_env);
            let path = check_database_file(&path)?;

            context.resolved_env.insert(
                DATABASE_PATH_KEY.to_string(),
                path.to_string_lossy().into_owned(),
            );
            context.database_path = Some(path);
        }
        context.advance(RunState::PathResolved);

        Ok(descriptor)
    }

    /// `PathResolved -> LockAcquired -> Invoking`, releasing the lock before returning
    async fn execute(&self, context: &mut RunContext, descriptor: &JobDescriptor) -> JobOutcome {
        let guard = match &context.database_path {
            Some(path) => match self.acquire_lock(path, descriptor.lock_mode).await {
                Ok(guard) => Some(guard),
                Err(outcome) => return outcome,
            },
            None => None,
        };
        context.advance(RunState::LockAcquired);

        context.arguments = descriptor.bind_arguments(&context.resolved_env);
        context.advance(RunState::Invoking);

        info!(
            "🚀 Running {} {}",
            descriptor.command,
            context.arguments.join(" ")
        );

        let result = self
            .invoker
            .invoke(
                descriptor,
                &context.arguments,
                &context.resolved_env,
                self.working_dir.as_deref(),
            )
            .await;

        drop(guard);

        match result {
            Ok(0) => JobOutcome::Success,
            Ok(exit_status) => JobOutcome::failed(
                FailureKind::JobExecution { exit_status },
                format!("{} exited with status {exit_status}", descriptor.command),
            ),
            Err(e) => JobOutcome::failed(
                FailureKind::Spawn,
                format!("could not start {}: {e}", descriptor.command),
            ),
        }
    }

    async fn acquire_lock(&self, path: &Path, mode: LockMode) -> Result<RunLockGuard, JobOutcome> {
        let resource_id = path.to_string_lossy();

        match self.lock.acquire(&resource_id, mode).await {
            Ok(guard) => Ok(guard),
            Err(LockError::Busy { .. }) if mode == LockMode::NonBlocking => {
                Err(JobOutcome::Skipped("lock busy".to_string()))
            }
            Err(e @ LockError::Busy { .. }) => {
                Err(JobOutcome::failed(FailureKind::LockTimeout, e.to_string()))
            }
            Err(e @ LockError::Io { .. }) => {
                Err(JobOutcome::failed(FailureKind::LockFailure, e.to_string()))
            }
        }
    }

    fn resolve_database_path(&self, env: &EnvMap) -> PathBuf {
        let connection_string = env
            .get(&self.database.url_key)
            .map_or("", String::as_str);
        let path = PathBuf::from(resource_path::resolve(
            connection_string,
            &self.database.fallback_path,
        ));

        match &self.working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    }
}

/// A zero-byte file is what a truncated database looks like; it is never used.
///
/// Returns the canonical path, which keys the lock so every spelling of the
/// same file contends for one lock.
fn check_database_file(path: &Path) -> Result<PathBuf, JobOutcome> {
    let missing = |detail: String| JobOutcome::failed(FailureKind::MissingDatabase, detail);

    match fs::metadata(path) {
        Ok(metadata) if !metadata.is_file() => {
            return Err(missing(format!("{} is not a regular file", path.display())))
        }
        Ok(metadata) if metadata.len() == 0 => {
            return Err(JobOutcome::failed(
                FailureKind::CorruptDatabase,
                format!("{} is empty", path.display()),
            ))
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(missing(format!("{} does not exist", path.display())))
        }
        Err(e) => return Err(missing(format!("cannot stat {}: {e}", path.display()))),
    }

    fs::canonicalize(path)
        .map_err(|e| missing(format!("cannot canonicalize {}: {e}", path.display())))
}

fn finish(context: &mut RunContext, outcome: JobOutcome) {
    context.complete(outcome);
    let elapsed_ms = context.elapsed_ms();
    let exit_code = context.exit_code();

    match &context.outcome {
        Some(JobOutcome::Success) => info!(
            job = %context.job_name,
            run_id = %context.run_id,
            elapsed_ms,
            exit_code,
            "✅ Job '{}' succeeded",
            context.job_name
        ),
        Some(JobOutcome::Skipped(reason)) => warn!(
            job = %context.job_name,
            run_id = %context.run_id,
            elapsed_ms,
            exit_code,
            "⏭️  Job '{}' skipped: {}",
            context.job_name,
            reason
        ),
        Some(JobOutcome::Failed { kind, detail }) => error!(
            job = %context.job_name,
            run_id = %context.run_id,
            stage = %kind.stage(),
            kind = %kind,
            elapsed_ms,
            exit_code,
            "❌ Job '{}' failed: {}",
            context.job_name,
            detail
        ),
        None => {}
    }
}
