//! Bootstrap configuration
//!
//! Loaded from TOML; every field has a default so a partial file (or no file)
//! works. Durations are stored as plain integers in the unit named by the
//! field suffix.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::throttle::ThrottleConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DroidgateConfig {
    pub device: DeviceConfig,
    pub app: AppConfig,
    pub appium: AppiumConfig,
    pub throttle: ThrottleSettings,
}

/// Device bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Bridge binary, resolved through PATH when not absolute
    pub bridge_path: String,
    /// Serial passed with `-s`
    pub device_id: String,
    /// Timeout for a single bridge call
    pub command_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bridge_path: "adb".to_string(),
            device_id: "emulator-5554".to_string(),
            command_timeout_ms: 5000,
        }
    }
}

/// The app under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Android package name, required
    pub package: String,
    /// Skip the adb lookup and use this activity
    pub activity: Option<String>,
    /// How long a `ps -A` listing is reused when checking whether the app runs
    pub running_cache_ttl_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            package: String::new(),
            activity: None,
            running_cache_ttl_secs: 10,
        }
    }
}

/// Appium endpoint and session capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppiumConfig {
    /// Prefer 127.0.0.1 over localhost to avoid IPv6/proxy surprises
    pub endpoint: String,
    pub automation_name: String,
    /// HTTP timeout per request; session creation installs the UIA2 server
    pub request_timeout_secs: u64,
    pub implicit_wait_secs: u64,
    /// Pause after the session opens so UiAutomator2 settles
    pub settle_ms: u64,
    pub no_reset: bool,
    pub full_reset: bool,
    pub new_command_timeout_secs: u64,
    pub disable_window_animation: bool,
    pub adb_exec_timeout_ms: u64,
    pub server_install_timeout_ms: u64,
    pub server_launch_timeout_ms: u64,
    /// Tolerates splash screens and redirects
    pub app_wait_activity: String,
    pub app_wait_duration_ms: u64,
    pub auto_grant_permissions: bool,
    pub enable_performance_logging: bool,
    pub adb_shell_enabled: bool,
    /// Additional capabilities, sent verbatim and applied last
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for AppiumConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:4723".to_string(),
            automation_name: "UiAutomator2".to_string(),
            request_timeout_secs: 300,
            implicit_wait_secs: 10,
            settle_ms: 1000,
            no_reset: true,
            full_reset: false,
            new_command_timeout_secs: 300,
            disable_window_animation: true,
            adb_exec_timeout_ms: 120_000,
            server_install_timeout_ms: 120_000,
            server_launch_timeout_ms: 120_000,
            app_wait_activity: "*".to_string(),
            app_wait_duration_ms: 60_000,
            auto_grant_permissions: true,
            enable_performance_logging: true,
            adb_shell_enabled: true,
            extra: BTreeMap::new(),
        }
    }
}

/// Serializable form of [`ThrottleConfig`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub min_interval_ms: u64,
    pub window_secs: u64,
    pub log_every: u64,
    pub warn_above: u64,
    pub log_tag: String,
    /// Mirror counters to the device system log
    pub device_log: bool,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        let defaults = ThrottleConfig::default();
        Self {
            min_interval_ms: defaults.min_interval.as_millis() as u64,
            window_secs: defaults.window.as_secs(),
            log_every: defaults.log_every,
            warn_above: defaults.warn_above,
            log_tag: defaults.log_tag,
            device_log: true,
        }
    }
}

impl From<&ThrottleSettings> for ThrottleConfig {
    fn from(settings: &ThrottleSettings) -> Self {
        Self {
            min_interval: Duration::from_millis(settings.min_interval_ms),
            window: Duration::from_secs(settings.window_secs),
            log_every: settings.log_every,
            warn_above: settings.warn_above,
            log_tag: settings.log_tag.clone(),
        }
    }
}

impl DroidgateConfig {
    /// Load configuration from file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> E2eResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> E2eResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings no session could be opened with
    pub fn validate(&self) -> E2eResult<()> {
        if self.app.package.trim().is_empty() {
            return Err(E2eError::InvalidConfig("app.package is required".to_string()));
        }
        if self.device.bridge_path.trim().is_empty() {
            return Err(E2eError::InvalidConfig("device.bridge_path is empty".to_string()));
        }
        if self.device.device_id.trim().is_empty() {
            return Err(E2eError::InvalidConfig("device.device_id is empty".to_string()));
        }
        if !self.appium.endpoint.starts_with("http://") && !self.appium.endpoint.starts_with("https://") {
            return Err(E2eError::InvalidConfig(format!(
                "appium.endpoint must be an http(s) URL, got {}",
                self.appium.endpoint
            )));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.device.command_timeout_ms)
    }

    pub fn running_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.app.running_cache_ttl_secs)
    }
}
