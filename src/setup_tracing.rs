use time::macros::format_description;
use tracing_subscriber::fmt::time::OffsetTime;

use crate::cli::Commands;

pub fn setup_tracing_for_command(command: &Commands, runner_log_level: &str) {
    // - Job runs need operational visibility, so they use the configured level
    // - Listing commands print to stdout and should stay quiet
    // - RUST_LOG overrides either (e.g. RUST_LOG=debug)
    let default_level = match command {
        Commands::Run { .. } | Commands::Check { .. } => runner_log_level,
        Commands::Jobs { .. } | Commands::Crontab { .. } | Commands::ResolvePath { .. } => "warn",
        Commands::Version => "error",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr) // Keep stdout for command output
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_ansi(false)
        .with_timer(OffsetTime::new(
            time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC),
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ))
        .compact()
        .init();
}
