use strum::{Display, EnumString};

/// Deployment stage, selected with `CRONWARDEN_ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    /// Base name of the optional config file for this stage (extension picked by config-rs)
    #[must_use]
    pub fn config_file_name(self) -> String {
        format!("config/{self}")
    }
}
