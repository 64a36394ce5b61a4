pub mod environment_gate;
pub mod job_descriptor;
pub mod job_registry;
pub mod job_result;
pub mod job_runner;
pub mod manage_command;
pub mod resource_path;
pub mod run_lock;

use std::{collections::HashMap, future::Future, io, path::Path};

use self::job_descriptor::JobDescriptor;

/// Boundary to the external job implementation.
///
/// The runner only hands over the command and its arguments and observes the
/// exit status; it never looks inside the job.
pub trait JobInvoker: Send + Sync {
    fn invoke(
        &self,
        descriptor: &JobDescriptor,
        arguments: &[String],
        env: &HashMap<String, String>,
        working_dir: Option<&Path>,
    ) -> impl Future<Output = Result<i32, io::Error>> + Send;
}
