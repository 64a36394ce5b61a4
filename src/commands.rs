pub mod check;
pub mod crontab;
pub mod jobs;
pub mod resolve_path;
pub mod run;
pub mod version;
