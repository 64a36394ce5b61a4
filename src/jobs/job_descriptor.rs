use std::{collections::HashMap, str::FromStr as _};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::run_lock::LockMode;

/// Static definition of a runnable scheduled job
#[derive(Debug, Clone, Copy, Serialize)]
pub struct JobDescriptor {
    pub name: &'static str,
    /// Management command the external application runs for this job
    pub command: &'static str,
    /// Keys that must resolve to non-empty values, in reporting order
    pub required_env: &'static [&'static str],
    /// Values applied when a key is absent or empty
    pub defaulted_env: &'static [(&'static str, &'static str)],
    pub lock_mode: LockMode,
    pub arguments: &'static [JobArgument],
    /// Jobs that never touch the shared database skip path checks and the lock
    pub requires_database: bool,
    /// Recommended 5-field crontab expression
    pub schedule: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobArgument {
    /// Always passed
    Flag(&'static str),
    /// `flag value`, omitted when the key is absent or empty
    Value {
        flag: &'static str,
        key: &'static str,
    },
    /// Passed alone when the key holds a truthy value (`1`, `true`, `yes`, `on`)
    Switch {
        flag: &'static str,
        key: &'static str,
    },
}

impl JobDescriptor {
    /// Binds the argument template against the resolved environment.
    #[must_use]
    pub fn bind_arguments(&self, env: &HashMap<String, String>) -> Vec<String> {
        let lookup = |key: &str| {
            env.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut bound = Vec::with_capacity(self.arguments.len() * 2);
        for argument in self.arguments {
            match *argument {
                JobArgument::Flag(flag) => bound.push(flag.to_string()),
                JobArgument::Value { flag, key } => {
                    if let Some(value) = lookup(key) {
                        bound.push(flag.to_string());
                        bound.push(value.to_string());
                    }
                }
                JobArgument::Switch { flag, key } => {
                    if lookup(key).is_some_and(is_truthy) {
                        bound.push(flag.to_string());
                    }
                }
            }
        }
        bound
    }

    /// Parses the crontab expression with the `cron` crate, which expects a
    /// leading seconds field.
    pub fn parse_schedule(&self) -> Result<cron::Schedule, cron::error::Error> {
        cron::Schedule::from_str(&format!("0 {}", self.schedule))
    }

    /// Next time the recommended schedule fires after `after`
    pub fn next_fire_time(
        &self,
        after: &DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, cron::error::Error> {
        Ok(self.parse_schedule()?.after(after).next())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
