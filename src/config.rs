//! Bridge configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "health_link".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Runtime configuration for the bridge.
///
/// Timeout defaults follow the vendor plugins this bridge replaces: 20
/// seconds per asynchronous hardware operation. Both values can be changed
/// at runtime through the `set_operation_timeout` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Deadline for a discovery scan to produce a device.
    #[serde(default = "default_timeout_ms")]
    pub discovery_timeout_ms: u64,
    /// Deadline for a reconnect-and-sync attempt to produce data.
    #[serde(default = "default_timeout_ms")]
    pub sync_timeout_ms: u64,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: default_timeout_ms(),
            sync_timeout_ms: default_timeout_ms(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    20_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: BridgeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.discovery_timeout_ms, 20_000);
        assert_eq!(config.sync_timeout_ms, 20_000);
        assert_eq!(config.log_settings.level, "info");
        assert!(config.log_settings.show_file_line);
        assert!(!config.log_settings.show_thread_ids);
    }
}
