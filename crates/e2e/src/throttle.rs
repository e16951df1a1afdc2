//! Request throttling for device bridge calls
//!
//! Appium and adb start dropping or rejecting commands when hammered, so every
//! call that counts against the budget goes through [`ThrottleGuard::gate`]:
//!
//! - consecutive gated calls are spaced by at least `min_interval`
//! - a rolling window counts calls, and the count is mirrored to the device
//!   system log every `log_every` calls and on every call past `warn_above`
//!
//! The guard owns its state. Share one instance with `Arc` to throttle several
//! runners together, or give each runner its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::bridge::{AdbCommand, CommandRunner};

/// Throttle tuning
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Minimum spacing between gated calls (0.35 s is ~171 calls/minute)
    pub min_interval: Duration,
    /// Length of the counting window
    pub window: Duration,
    /// Mirror the counter to the device log every N calls
    pub log_every: u64,
    /// Calls per window above which every call is reported as a warning
    pub warn_above: u64,
    /// Device log tag
    pub log_tag: String,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(350),
            window: Duration::from_secs(60),
            log_every: 50,
            warn_above: 200,
            log_tag: "AppiumThrottle".to_string(),
        }
    }
}

/// Point-in-time view of the throttle counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSnapshot {
    pub request_counter: u64,
    pub window_start: Instant,
    pub last_request: Option<Instant>,
}

struct ThrottleState {
    last_request: Option<Instant>,
    request_counter: u64,
    window_start: Instant,
}

/// Best-effort writer to the device system log (`adb shell log -t <tag>`)
pub struct DeviceLog {
    runner: Arc<dyn CommandRunner>,
    adb: AdbCommand,
    timeout: Duration,
}

impl DeviceLog {
    pub fn new(runner: Arc<dyn CommandRunner>, adb: AdbCommand, timeout: Duration) -> Self {
        Self { runner, adb, timeout }
    }

    /// Never fails; problems are only traced
    pub async fn write(&self, tag: &str, message: &str) {
        let argv = self.adb.log(tag, message);
        match self.runner.run(&argv, self.timeout).await {
            Ok(result) if !result.success() => {
                debug!(exit_code = result.exit_code, "Device log write failed: {}", result.detail());
            }
            Ok(_) => {}
            Err(e) => debug!("Device log write failed: {}", e),
        }
    }
}

/// Spacing and per-window accounting for device bridge calls
pub struct ThrottleGuard {
    config: ThrottleConfig,
    state: Mutex<ThrottleState>,
    device_log: Option<DeviceLog>,
}

impl ThrottleGuard {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ThrottleState {
                last_request: None,
                request_counter: 0,
                window_start: Instant::now(),
            }),
            device_log: None,
        }
    }

    /// Mirror counters to the device system log
    pub fn with_device_log(mut self, device_log: DeviceLog) -> Self {
        self.device_log = Some(device_log);
        self
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Wait for this call's turn and count it.
    ///
    /// The state lock is held across the pause, so concurrent callers are
    /// admitted one at a time. Returns the call's number within the current
    /// window.
    pub async fn gate(&self) -> u64 {
        let count = {
            let mut state = self.state.lock().await;
            let now = Instant::now();

            if let Some(last) = state.last_request {
                let elapsed = now.duration_since(last);
                if elapsed < self.config.min_interval {
                    let wait = self.config.min_interval - elapsed;
                    debug!(wait_ms = wait.as_millis() as u64, "Throttle: waiting to stay under the limit");
                    sleep(wait).await;
                }
            }

            state.last_request = Some(Instant::now());

            if now.duration_since(state.window_start) > self.config.window {
                state.request_counter = 0;
                state.window_start = now;
            }

            state.request_counter += 1;
            debug!(request = state.request_counter, "Request in the current window");
            state.request_counter
        };

        self.report(count).await;
        count
    }

    async fn report(&self, count: u64) {
        let over_budget = count > self.config.warn_above;
        let periodic = self.config.log_every > 0 && count % self.config.log_every == 0;

        if periodic || over_budget {
            self.device_log(&format!("Request #{count} in current minute")).await;
        }

        if over_budget {
            warn!(
                request = count,
                "Throttle: exceeded {} requests/min, current: {}",
                self.config.warn_above,
                count
            );
            self.device_log(&format!(
                "THROTTLE: exceeded {} requests/min, current: {count}",
                self.config.warn_above
            ))
            .await;
        }
    }

    async fn device_log(&self, message: &str) {
        if let Some(log) = &self.device_log {
            log.write(&self.config.log_tag, message).await;
        }
    }

    pub async fn snapshot(&self) -> ThrottleSnapshot {
        let state = self.state.lock().await;
        ThrottleSnapshot {
            request_counter: state.request_counter,
            window_start: state.window_start,
            last_request: state.last_request,
        }
    }
}
