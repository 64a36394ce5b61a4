//! Cronwarden - guarded runner for scheduled maintenance jobs
//!
//! Each invocation validates the job's environment, resolves the shared
//! database path, takes an exclusive per-database lock and then runs the
//! application's management command, mapping every outcome to a distinct
//! exit code for the scheduler.

#![allow(missing_docs)]

pub mod app_info;
pub mod boot;
pub mod cli;
pub mod commands;
pub mod config;
pub mod environment;
pub mod jobs;
pub mod run_environment;
pub mod setup_tracing;
