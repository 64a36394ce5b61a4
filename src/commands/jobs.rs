use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::jobs::{job_descriptor::JobDescriptor, job_registry::JobRegistry, run_lock::LockMode};

#[derive(Debug, Serialize)]
struct JobSummary<'a> {
    name: &'a str,
    command: &'a str,
    schedule: &'a str,
    next_run: Option<DateTime<Utc>>,
    lock: LockMode,
    requires_database: bool,
    required_env: &'a [&'static str],
}

impl<'a> JobSummary<'a> {
    fn new(descriptor: &'a JobDescriptor, now: &DateTime<Utc>) -> Self {
        Self {
            name: descriptor.name,
            command: descriptor.command,
            schedule: descriptor.schedule,
            next_run: descriptor.next_fire_time(now).ok().flatten(),
            lock: descriptor.lock_mode,
            requires_database: descriptor.requires_database,
            required_env: descriptor.required_env,
        }
    }
}

/// Handle the `jobs` command - lists registered jobs with their next scheduled run.
pub fn handle_jobs_command(registry: &JobRegistry, json: bool) -> i32 {
    let now = Utc::now();
    let descriptors = registry.descriptors();
    let summaries: Vec<_> = descriptors
        .iter()
        .map(|descriptor| JobSummary::new(descriptor, &now))
        .collect();

    if json {
        match serde_json::to_string_pretty(&summaries) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("❌ Failed to render job list: {e}");
                return 1;
            }
        }
        return 0;
    }

    println!("🗓️  Registered jobs\n");
    for summary in &summaries {
        print!("{}", render_summary(summary));
    }
    0
}

fn render_summary(summary: &JobSummary<'_>) -> String {
    let next_run = summary
        .next_run
        .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
    let database = if summary.requires_database {
        format!("database, lock {}", summary.lock)
    } else {
        "no database".to_string()
    };

    format!(
        "{:<14} {:<16} next {}\n{:<14} {} ({database})\n{:<14} requires: {}\n\n",
        summary.name,
        summary.schedule,
        next_run,
        "",
        summary.command,
        "",
        summary.required_env.join(", "),
    )
}
