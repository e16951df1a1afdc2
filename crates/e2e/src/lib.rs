//! Droidgate: Appium session bootstrap for Android E2E suites
//!
//! This crate prepares a UiAutomator2 session against a device or emulator:
//! - Resolves the app's exported launcher activity over adb
//! - Spaces and counts device-bound calls with a throttle guard
//! - Opens the W3C session and brings the app to the foreground
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SessionBootstrapper                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  resolve_activity()                                         │
//! │    └── LauncherResolver ── CommandRunner (adb) ── activity  │
//! │  capabilities(activity) -> SessionCapabilities              │
//! │  create_session() -> AppSession                             │
//! │    ├── WebDriverClient::new_session()                       │
//! │    ├── RemoteSession::set_implicit_wait()                   │
//! │    └── bring_to_foreground()                                │
//! │          ├── RunningAppProbe (ps -A, cached)                │
//! │          └── mobile: activateApp                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ThrottleGuard: gates every device-bound Appium call        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod activity;
pub mod bridge;
pub mod cache;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod foreground;
pub mod resolver;
pub mod session;
pub mod throttle;
pub mod webdriver;

pub use bridge::{AdbCommand, CommandRunner, DeviceCommandResult, ProcessInvoker};
pub use capabilities::SessionCapabilities;
pub use config::DroidgateConfig;
pub use error::{E2eError, E2eResult};
pub use foreground::{AppState, AutomationSession, RunningAppProbe};
pub use resolver::{LauncherResolver, Strategy};
pub use session::{AppSession, SessionBootstrapper};
pub use throttle::{DeviceLog, ThrottleConfig, ThrottleGuard, ThrottleSnapshot};
pub use webdriver::{RemoteSession, WebDriverClient};
