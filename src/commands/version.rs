use std::{env, fmt::Write as _};

use crate::app_info::AppInfo;

pub fn print_version_info(app: AppInfo) {
    print!("{}", version_info(app));
}

fn version_info(app: AppInfo) -> String {
    let core = AppInfo::cronwarden();

    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_timestamp = option_env!("BUILD_TIMESTAMP").unwrap_or("unknown");
    let rustc_version = option_env!("RUSTC_VERSION").unwrap_or("unknown");

    let mut out = String::new();
    let _ = writeln!(out, "📦 {} v{}", app.name, app.version);
    if !app.description.is_empty() {
        let _ = writeln!(out, "📝 {}", app.description);
    }
    if !app.is_core() {
        let _ = writeln!(out, "🧱 Uses {} v{}", core.name, core.version);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "🔨 Build: {git_hash} ({build_timestamp}, rustc {rustc_version})");
    let _ = writeln!(out, "💻 Runtime: {}/{}", env::consts::OS, env::consts::ARCH);
    out
}
