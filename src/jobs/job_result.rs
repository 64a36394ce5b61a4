use std::fmt::{Display, Formatter, Result};

use strum::Display as StrumDisplay;

/// Exit code for a missing or unreadable configuration source
pub const EXIT_CONFIG_UNREADABLE: i32 = 2;
/// Exit code for missing required environment variables
pub const EXIT_MISSING_ENV: i32 = 3;
/// Exit code for a missing or empty database file
pub const EXIT_DATABASE: i32 = 4;
/// Exit code for a lock that could not be taken in time or at all
pub const EXIT_LOCK: i32 = 5;
/// Exit code for a malformed command line (`EX_USAGE`)
pub const EXIT_USAGE: i32 = 64;
/// Exit code for a job name the registry does not know
pub const EXIT_UNKNOWN_JOB: i32 = EXIT_USAGE;
/// Exit code when the external job could not be started
pub const EXIT_SPAWN: i32 = 127;

/// Pipeline stage at which a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Registry,
    Environment,
    Database,
    Lock,
    Invoke,
}

#[derive(Debug, Clone, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    UnknownJob,
    ConfigUnreadable,
    MissingEnv,
    MissingDatabase,
    CorruptDatabase,
    LockTimeout,
    LockFailure,
    Spawn,
    JobExecution { exit_status: i32 },
}

impl FailureKind {
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::UnknownJob => Stage::Registry,
            Self::ConfigUnreadable | Self::MissingEnv => Stage::Environment,
            Self::MissingDatabase | Self::CorruptDatabase => Stage::Database,
            Self::LockTimeout | Self::LockFailure => Stage::Lock,
            Self::Spawn | Self::JobExecution { .. } => Stage::Invoke,
        }
    }

    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownJob => EXIT_UNKNOWN_JOB,
            Self::ConfigUnreadable => EXIT_CONFIG_UNREADABLE,
            Self::MissingEnv => EXIT_MISSING_ENV,
            Self::MissingDatabase | Self::CorruptDatabase => EXIT_DATABASE,
            Self::LockTimeout | Self::LockFailure => EXIT_LOCK,
            Self::Spawn => EXIT_SPAWN,
            Self::JobExecution { exit_status } => *exit_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Skipped(String),
    Failed { kind: FailureKind, detail: String },
}

impl JobOutcome {
    pub fn failed(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            detail: detail.into(),
        }
    }

    /// Process exit code reported to the timer.
    ///
    /// A skipped run is not an error: the next tick retries it.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Success | Self::Skipped(_) => 0,
            Self::Failed { kind, .. } => kind.exit_code(),
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl Display for JobOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
            Self::Failed { kind, detail } => {
                write!(f, "failed in {} ({kind}): {detail}", kind.stage())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_exit_codes() {
        assert_eq!(JobOutcome::Success.exit_code(), 0);
        assert_eq!(JobOutcome::Skipped("lock busy".into()).exit_code(), 0);
        assert_eq!(
            JobOutcome::failed(FailureKind::ConfigUnreadable, "").exit_code(),
            2
        );
        assert_eq!(JobOutcome::failed(FailureKind::MissingEnv, "").exit_code(), 3);
        assert_eq!(
            JobOutcome::failed(FailureKind::MissingDatabase, "").exit_code(),
            4
        );
        assert_eq!(
            JobOutcome::failed(FailureKind::CorruptDatabase, "").exit_code(),
            4
        );
    }

    #[test]
    fn test_job_exit_status_is_propagated() {
        let outcome = JobOutcome::failed(FailureKind::JobExecution { exit_status: 7 }, "exit 7");
        assert_eq!(outcome.exit_code(), 7);
    }

    #[test]
    fn test_display_names_stage_and_kind() {
        let outcome = JobOutcome::failed(FailureKind::MissingEnv, "SPACES_KEY, SPACES_SECRET");
        assert_eq!(
            outcome.to_string(),
            "failed in environment (missing_env): SPACES_KEY, SPACES_SECRET"
        );
        assert_eq!(
            JobOutcome::Skipped("lock busy".into()).to_string(),
            "skipped: lock busy"
        );
    }
}
