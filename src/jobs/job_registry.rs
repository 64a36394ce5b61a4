use std::collections::HashMap;

use tracing::warn;

use super::{
    job_descriptor::{JobArgument, JobDescriptor},
    run_lock::LockMode,
};

/// Health check; database-agnostic so it still reports while another job holds the lock.
pub const HEALTHCHECK: JobDescriptor = JobDescriptor {
    name: "healthcheck",
    command: "healthcheck",
    required_env: &["DJANGO_SETTINGS_MODULE"],
    defaulted_env: &[("HEALTHCHECK_TIMEOUT_MS", "2000")],
    lock_mode: LockMode::NonBlocking,
    arguments: &[
        JobArgument::Flag("--json"),
        JobArgument::Value {
            flag: "--timeout-ms",
            key: "HEALTHCHECK_TIMEOUT_MS",
        },
    ],
    requires_database: false,
    schedule: "*/5 * * * *",
};

/// Operations database backup to object storage. Missing one tick is harmless.
pub const BACKUP: JobDescriptor = JobDescriptor {
    name: "backup",
    command: "backup_operations_db",
    required_env: &[
        "DATABASE_URL",
        "SPACES_KEY",
        "SPACES_SECRET",
        "SPACES_BUCKET",
    ],
    defaulted_env: &[
        ("SPACES_REGION", "nyc3"),
        ("BACKUP_PREFIX", "backups/operations"),
        ("BACKUP_FILENAME", "operations"),
        ("BACKUP_MAX_DAYS", "30"),
    ],
    lock_mode: LockMode::NonBlocking,
    arguments: &[
        JobArgument::Value {
            flag: "--db-path",
            key: "DB_PATH",
        },
        JobArgument::Value {
            flag: "--prefix",
            key: "BACKUP_PREFIX",
        },
        JobArgument::Value {
            flag: "--filename",
            key: "BACKUP_FILENAME",
        },
        JobArgument::Value {
            flag: "--max-days",
            key: "BACKUP_MAX_DAYS",
        },
        JobArgument::Switch {
            flag: "--dry-run",
            key: "BACKUP_DRY_RUN",
        },
        JobArgument::Flag("--json"),
    ],
    requires_database: true,
    schedule: "15 */6 * * *",
};

/// Brokerage fill sync; needs a consistent snapshot, so it queues briefly instead of skipping.
pub const SYNC_FILLS: JobDescriptor = JobDescriptor {
    name: "sync_fills",
    command: "sync_alpaca_filled_orders_last_days",
    required_env: &[
        "DATABASE_URL",
        "ALPACA_API_KEY",
        "ALPACA_SECRET_KEY",
        "SYNC_FUND_ID",
    ],
    defaulted_env: &[("SYNC_DAYS", "7"), ("SYNC_LIMIT", "500")],
    lock_mode: LockMode::BoundedWait(60),
    arguments: &[
        JobArgument::Value {
            flag: "--fund-id",
            key: "SYNC_FUND_ID",
        },
        JobArgument::Value {
            flag: "--days",
            key: "SYNC_DAYS",
        },
        JobArgument::Value {
            flag: "--limit",
            key: "SYNC_LIMIT",
        },
    ],
    requires_database: true,
    schedule: "*/30 * * * *",
};

pub const MONTHLY_REPORT: JobDescriptor = JobDescriptor {
    name: "monthly_report",
    command: "run_monthly_reporting_workflow",
    required_env: &["DATABASE_URL", "DEFAULT_FROM_EMAIL", "OPENAI_API_KEY"],
    defaulted_env: &[("REPORT_BENCHMARK_SYMBOL", "SPY")],
    lock_mode: LockMode::BoundedWait(300),
    arguments: &[
        JobArgument::Value {
            flag: "--fund-id",
            key: "REPORT_FUND_ID",
        },
        JobArgument::Value {
            flag: "--benchmark-symbol",
            key: "REPORT_BENCHMARK_SYMBOL",
        },
        JobArgument::Value {
            flag: "--subject-prefix",
            key: "REPORT_SUBJECT_PREFIX",
        },
        JobArgument::Switch {
            flag: "--dry-run-email",
            key: "REPORT_DRY_RUN_EMAIL",
        },
    ],
    requires_database: true,
    schedule: "0 6 1 * *",
};

#[derive(Debug, Clone)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, JobDescriptor>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Registry holding the deployment's scheduled jobs
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in [HEALTHCHECK, BACKUP, SYNC_FILLS, MONTHLY_REPORT] {
            registry.register_job(descriptor);
        }
        registry
    }

    pub fn register_job(&mut self, descriptor: JobDescriptor) {
        if self.jobs.insert(descriptor.name, descriptor).is_some() {
            warn!(
                "Job '{}' registered twice, keeping the later definition",
                descriptor.name
            );
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&JobDescriptor> {
        self.jobs.get(name)
    }

    pub fn job_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.jobs.keys().copied()
    }

    /// Descriptors ordered by name
    #[must_use]
    pub fn descriptors(&self) -> Vec<&JobDescriptor> {
        let mut descriptors: Vec<_> = self.jobs.values().collect();
        descriptors.sort_by_key(|d| d.name);
        descriptors
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contains_deployment_jobs() {
        let registry = JobRegistry::builtin();
        let names: Vec<_> = registry.descriptors().iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["backup", "healthcheck", "monthly_report", "sync_fills"]
        );
    }

    #[test]
    fn test_builtin_schedules_are_valid() {
        for descriptor in JobRegistry::builtin().descriptors() {
            assert!(
                descriptor.parse_schedule().is_ok(),
                "invalid schedule for {}",
                descriptor.name
            );
        }
    }

    #[test]
    fn test_database_jobs_require_the_database_url() {
        for descriptor in JobRegistry::builtin().descriptors() {
            if descriptor.requires_database {
                assert!(
                    descriptor.required_env.contains(&"DATABASE_URL"),
                    "{} must require DATABASE_URL",
                    descriptor.name
                );
            }
        }
    }

    #[test]
    fn test_frequent_jobs_skip_and_snapshot_jobs_wait() {
        let registry = JobRegistry::builtin();
        assert_eq!(registry.get("backup").unwrap().lock_mode, LockMode::NonBlocking);
        assert_eq!(
            registry.get("sync_fills").unwrap().lock_mode,
            LockMode::BoundedWait(60)
        );
        assert!(matches!(
            registry.get("monthly_report").unwrap().lock_mode,
            LockMode::BoundedWait(_)
        ));
    }

    #[test]
    fn test_later_registration_replaces_earlier() {
        let mut registry = JobRegistry::new();
        registry.register_job(BACKUP);
        registry.register_job(JobDescriptor {
            command: "other_command",
            ..BACKUP
        });

        assert_eq!(registry.job_names().count(), 1);
        assert_eq!(registry.get("backup").unwrap().command, "other_command");
        assert!(registry.get("missing").is_none());
    }
}
