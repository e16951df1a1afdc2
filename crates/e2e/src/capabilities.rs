//! Appium session capabilities

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::{AppiumConfig, DroidgateConfig};

/// Capability mapping sent with the new-session request.
///
/// Appium-specific keys carry the `appium:` vendor prefix required by W3C.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCapabilities(Map<String, Value>);

impl SessionCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities for a UiAutomator2 session against `config`'s device and app.
    /// `appium:appActivity` is only set when an activity is known; otherwise
    /// Appium picks the launcher itself.
    pub fn android(config: &DroidgateConfig, activity: Option<&str>) -> Self {
        let appium = &config.appium;
        let mut caps = Self::new();

        caps.set("platformName", "Android")
            .set("appium:automationName", appium.automation_name.as_str())
            .set("appium:deviceName", config.device.device_id.as_str())
            .set("appium:appPackage", config.app.package.as_str());

        if let Some(activity) = activity {
            caps.set("appium:appActivity", activity);
        }

        caps.apply_session_behaviour(appium);

        for (key, value) in &appium.extra {
            caps.set(key.as_str(), value.clone());
        }

        caps
    }

    fn apply_session_behaviour(&mut self, appium: &AppiumConfig) {
        self.set("appium:noReset", appium.no_reset)
            .set("appium:fullReset", appium.full_reset)
            .set("appium:newCommandTimeout", appium.new_command_timeout_secs)
            .set("appium:disableWindowAnimation", appium.disable_window_animation)
            .set("appium:adbExecTimeout", appium.adb_exec_timeout_ms)
            .set("appium:uiautomator2ServerInstallTimeout", appium.server_install_timeout_ms)
            .set("appium:uiautomator2ServerLaunchTimeout", appium.server_launch_timeout_ms)
            .set("appium:appWaitActivity", appium.app_wait_activity.as_str())
            .set("appium:appWaitDuration", appium.app_wait_duration_ms)
            .set("appium:autoGrantPermissions", appium.auto_grant_permissions)
            .set("appium:enablePerformanceLogging", appium.enable_performance_logging)
            .set("appium:adbShellEnabled", appium.adb_shell_enabled);
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Body of a W3C `POST /session`
    pub fn to_new_session_body(&self) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": Value::Object(self.0.clone()),
                "firstMatch": [{}],
            }
        })
    }
}
