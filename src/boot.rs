use std::{env, ffi::OsString, str::FromStr as _};

use clap::{error::ErrorKind, Parser as _};
use config_rs::Config as ConfigRs;
use tracing::{debug, trace};

use crate::{
    app_info::AppInfo,
    cli::{Cli, Commands},
    commands::{check, crontab, jobs, resolve_path, run, version},
    config::Config,
    environment::Environment,
    jobs::{
        job_registry::JobRegistry,
        job_result::{EXIT_CONFIG_UNREADABLE, EXIT_USAGE},
    },
    run_environment::EnvMap,
    setup_tracing::setup_tracing_for_command,
};

const ENVIRONMENT_VARIABLE: &str = "CRONWARDEN_ENVIRONMENT";
const CONFIG_ENV_PREFIX: &str = "CRONWARDEN";

/// Everything a binary needs to hand over to start the runner.
///
/// Deployments with their own job set build a registry and pass it here.
pub struct BootConfig {
    pub app_info: AppInfo,
    pub job_registry: JobRegistry,
}

impl BootConfig {
    #[must_use]
    pub const fn new(app_info: AppInfo, job_registry: JobRegistry) -> Self {
        Self {
            app_info,
            job_registry,
        }
    }
}

/// Parses the command line, loads configuration and runs the command.
/// Returns the process exit code.
pub async fn boot(config: BootConfig) -> i32 {
    let cli = match parse_cli(env::args_os()) {
        Ok(cli) => cli,
        Err(code) => return code,
    };

    if matches!(cli.command, Commands::Version) {
        version::print_version_info(config.app_info);
        return 0;
    }

    let environment = set_environment();

    let app_config = match read_config(environment) {
        Ok(app_config) => app_config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {e}");
            return EXIT_CONFIG_UNREADABLE;
        }
    };

    setup_tracing_for_command(&cli.command, &app_config.tracing.log_level);

    debug!("Environment set to: {:?}", environment);
    trace!("Configuration loaded: {:?}", app_config);

    handle_command(&app_config, cli, config.job_registry, config.app_info).await
}

/// Parses arguments, printing help or usage errors. `Err` carries the exit
/// code: 0 for help and version output, `EXIT_USAGE` otherwise.
fn parse_cli<I, T>(args: I) -> Result<Cli, i32>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|e| {
        let _ = e.print();
        match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => EXIT_USAGE,
        }
    })
}

#[must_use]
pub fn set_environment() -> Environment {
    env::var(ENVIRONMENT_VARIABLE)
        .ok()
        .and_then(|s| Environment::from_str(&s).ok())
        .unwrap_or_default()
}

/// Layers `config/<environment>.*` (optional) under `CRONWARDEN_*` variables,
/// e.g. `CRONWARDEN_RUNNER__LOCK_DIR=/run/cronwarden`.
pub fn read_config(environment: Environment) -> Result<Config, config_rs::ConfigError> {
    let config_file_name = environment.config_file_name();

    trace!("Reading configuration from: {}", config_file_name);

    ConfigRs::builder()
        .add_source(config_rs::File::with_name(&config_file_name).required(false))
        .add_source(
            config_rs::Environment::with_prefix(CONFIG_ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(" ")
                .with_list_parse_key("runner.program_args"),
        )
        .build()?
        .try_deserialize()
}

pub async fn handle_command(
    config: &Config,
    cli: Cli,
    job_registry: JobRegistry,
    app_info: AppInfo,
) -> i32 {
    match cli.command {
        Commands::Run { job, overrides } => {
            run::handle_run_command(config, job_registry, &job, into_env_map(overrides)).await
        }
        Commands::Check { job, overrides } => {
            check::handle_check_command(config, job_registry, &job, into_env_map(overrides))
        }
        Commands::Jobs { json } => jobs::handle_jobs_command(&job_registry, json),
        Commands::Crontab { binary } => crontab::handle_crontab_command(&job_registry, binary),
        Commands::ResolvePath {
            connection_string,
            fallback,
        } => resolve_path::handle_resolve_path_command(&connection_string, &fallback),
        Commands::Version => {
            version::print_version_info(app_info);
            0
        }
    }
}

fn into_env_map(overrides: Vec<(String, String)>) -> EnvMap {
    overrides.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let config = read_config(Environment::Test).unwrap();

        assert_eq!(config.database.url_key, "DATABASE_URL");
        assert_eq!(config.runner.program, "python");
    }

    #[test]
    fn test_usage_errors_exit_64() {
        assert_eq!(
            parse_cli(["cronwarden", "run", "backup", "--set", "NOEQUALS"]).err(),
            Some(EXIT_USAGE)
        );
        assert_eq!(parse_cli(["cronwarden", "frobnicate"]).err(), Some(EXIT_USAGE));
        assert_eq!(parse_cli(["cronwarden"]).err(), Some(EXIT_USAGE));
    }

    #[test]
    fn test_help_exits_0() {
        assert_eq!(parse_cli(["cronwarden", "--help"]).err(), Some(0));
    }

    #[test]
    fn test_valid_arguments_parse() {
        let cli = parse_cli(["cronwarden", "run", "backup"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { job, .. } if job == "backup"));
    }

    #[test]
    fn test_later_override_wins() {
        let env = into_env_map(vec![
            ("SYNC_DAYS".to_string(), "3".to_string()),
            ("SYNC_DAYS".to_string(), "14".to_string()),
        ]);
        assert_eq!(env.get("SYNC_DAYS").map(String::as_str), Some("14"));
    }
}
