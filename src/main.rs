use cronwarden::{
    app_info::AppInfo,
    boot::{boot, BootConfig},
    jobs::job_registry::JobRegistry,
};

#[tokio::main]
async fn main() {
    let code = boot(BootConfig::new(AppInfo::cronwarden(), JobRegistry::builtin())).await;
    std::process::exit(code);
}
