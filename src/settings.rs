use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::monitor::{MonitorConfig, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_LOG_PATH: &str = "info_chat_loot.log";
pub const DEFAULT_WINDOW_MINUTES: u32 = 60;
pub const DEFAULT_REFRESH_SECS: u32 = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorSettings {
    pub log_path: String,
    pub window_minutes: u32,
    pub refresh_secs: u32,
    pub read_from_start: bool,
    pub prices: HashMap<String, u64>,
    pub categories: HashMap<String, String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            log_path: DEFAULT_LOG_PATH.to_string(),
            window_minutes: DEFAULT_WINDOW_MINUTES,
            refresh_secs: DEFAULT_REFRESH_SECS,
            read_from_start: false,
            prices: HashMap::new(),
            categories: HashMap::new(),
        }
    }
}

impl MonitorSettings {
    pub fn to_config(&self) -> Result<MonitorConfig, String> {
        let log_path = self.log_path.trim();
        if log_path.is_empty() {
            return Err("Please select a loot log file".to_string());
        }

        let config = MonitorConfig {
            log_path: PathBuf::from(log_path),
            window_minutes: self.window_minutes,
            refresh_interval: Duration::from_secs(u64::from(self.refresh_secs)),
            read_from_start: self.read_from_start,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        config.validate()?;

        Ok(config)
    }
}

pub fn load_settings(settings_path: &Path) -> Result<MonitorSettings, String> {
    let raw_json = match std::fs::read_to_string(settings_path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            tracing::info!(
                settings_path = %settings_path.display(),
                "Settings file not found, using defaults"
            );
            return Ok(MonitorSettings::default());
        }
        Err(error) => {
            return Err(format!(
                "Failed to read settings '{}': {error}",
                settings_path.display()
            ));
        }
    };

    serde_json::from_str::<MonitorSettings>(&raw_json).map_err(|error| {
        format!(
            "Failed to parse settings '{}': {error}",
            settings_path.display()
        )
    })
}
