/// Identifies a binary crate and its version metadata.
///
/// Deployments that wrap `cronwarden` with their own job registry pass their
/// own `AppInfo` so `version` reports both.
#[derive(Clone, Copy, Debug)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

impl AppInfo {
    #[must_use]
    pub const fn new(name: &'static str, version: &'static str, description: &'static str) -> Self {
        Self {
            name,
            version,
            description,
        }
    }

    #[must_use]
    pub const fn cronwarden() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
        }
    }

    /// True when this describes the cronwarden crate itself
    #[must_use]
    pub fn is_core(&self) -> bool {
        self.name == env!("CARGO_PKG_NAME")
    }
}
