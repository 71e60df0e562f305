//! Capture configuration and its per-context mirror.

use serde::{Deserialize, Serialize};
use tracing::debug;

use netscribe_core::Result;
use netscribe_store::keys;
use netscribe_store::{Storage, StorageChange};

/// The process-wide capture configuration.
///
/// Every context owns a copy loaded at start-up and keeps it current by
/// applying [`StorageChange`] notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(rename = "apiTargetUrl")]
    pub api_target_url: String,
    #[serde(rename = "consoleTargetUrl")]
    pub console_target_url: String,
    #[serde(rename = "isLoggingActive")]
    pub logging_active: bool,
}

/// What a change notification did to a mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsDelta {
    /// Logging flipped from inactive to active.
    pub activated: bool,
    /// Logging flipped from active to inactive.
    pub deactivated: bool,
    /// Either target substring changed.
    pub targets_changed: bool,
}

impl SettingsDelta {
    pub fn is_empty(&self) -> bool {
        !self.activated && !self.deactivated && !self.targets_changed
    }
}

impl CaptureSettings {
    /// Load from storage; missing keys fall back to empty/inactive.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        Ok(Self {
            api_target_url: storage.get_string(keys::API_TARGET_URL)?,
            console_target_url: storage.get_string(keys::CONSOLE_TARGET_URL)?,
            logging_active: storage.get_bool(keys::IS_LOGGING_ACTIVE)?,
        })
    }

    /// Apply a storage change notification to this mirror.
    pub fn apply(&mut self, change: &StorageChange) -> SettingsDelta {
        let mut delta = SettingsDelta::default();
        let StorageChange::Value { key, new_value, .. } = change else {
            return delta;
        };

        match key.as_str() {
            keys::API_TARGET_URL => {
                let url = text_value(new_value);
                delta.targets_changed = url != self.api_target_url;
                self.api_target_url = url;
            }
            keys::CONSOLE_TARGET_URL => {
                let url = text_value(new_value);
                delta.targets_changed = url != self.console_target_url;
                self.console_target_url = url;
            }
            keys::IS_LOGGING_ACTIVE => {
                let active = new_value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false);
                delta.activated = !self.logging_active && active;
                delta.deactivated = self.logging_active && !active;
                self.logging_active = active;
            }
            _ => {}
        }

        if !delta.is_empty() {
            debug!("Settings mirror updated via {}: {:?}", key, delta);
        }
        delta
    }
}

fn text_value(value: &Option<serde_json::Value>) -> String {
    value
        .as_ref()
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
