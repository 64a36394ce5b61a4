use std::env;

use crate::jobs::job_registry::JobRegistry;

/// Handle the `crontab` command - prints one entry per registered job.
pub fn handle_crontab_command(registry: &JobRegistry, binary: Option<String>) -> i32 {
    let binary = match binary {
        Some(binary) => binary,
        None => match env::current_exe() {
            Ok(path) => path.display().to_string(),
            Err(e) => {
                eprintln!("❌ Cannot determine executable path, pass --binary: {e}");
                return 1;
            }
        },
    };

    print!("{}", render_crontab(registry, &binary));
    0
}

fn render_crontab(registry: &JobRegistry, binary: &str) -> String {
    let mut out = String::from("# Generated by cronwarden; one line per registered job\n");
    for descriptor in registry.descriptors() {
        out.push_str(&format!(
            "{} {binary} run {}\n",
            descriptor.schedule, descriptor.name
        ));
    }
    out
}
