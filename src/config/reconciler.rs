use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Reconciler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ReconcilerConfig {
    /// Delay between polls while a user is transitioning to a new status.
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,

    /// Maximum number of polls before a status transition is reported as stuck.
    #[serde(default = "default_status_poll_attempts")]
    pub status_poll_attempts: u32,

    /// Suppress the notification e-mail sent when an admin role is assigned.
    #[serde(default)]
    pub disable_role_notifications: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            status_poll_interval_ms: default_status_poll_interval_ms(),
            status_poll_attempts: default_status_poll_attempts(),
            disable_role_notifications: false,
        }
    }
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.status_poll_attempts == 0 {
            return Err(ConfigError::Validation(
                "reconciler.status_poll_attempts must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }
}

fn default_status_poll_interval_ms() -> u64 {
    1_000
}

fn default_status_poll_attempts() -> u32 {
    30
}
