use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scheduled job under the database lock
    Run {
        /// Registered job name (see `jobs`)
        job: String,
        /// Override a resolved environment value for this run
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        overrides: Vec<(String, String)>,
    },
    /// Validate a job's environment and database without running it
    Check {
        job: String,
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        overrides: Vec<(String, String)>,
    },
    /// List registered jobs
    Jobs {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print crontab entries for every registered job
    Crontab {
        /// Path of the binary the entries should call (default: this executable)
        #[arg(long)]
        binary: Option<String>,
    },
    /// Show the database path a connection string resolves to
    ResolvePath {
        connection_string: String,
        #[arg(long, default_value = "/data/operations.db")]
        fallback: String,
    },
    /// Show version information
    Version,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
