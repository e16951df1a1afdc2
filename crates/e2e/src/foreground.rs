//! Bringing the app under test to the foreground

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::CacheEntry;
use crate::error::E2eResult;
use crate::throttle::ThrottleGuard;
use crate::webdriver::RemoteSession;

/// Timeout handed to `ps -A` on the device
pub const PROCESS_LIST_TIMEOUT: Duration = Duration::from_millis(5000);

/// The remote-session operations foregrounding needs
#[async_trait]
pub trait AutomationSession: Send + Sync {
    async fn shell(&self, command: &str, args: &[&str], timeout: Duration) -> E2eResult<String>;

    async fn activate_app(&self, app_id: &str) -> E2eResult<()>;
}

#[async_trait]
impl AutomationSession for RemoteSession {
    async fn shell(&self, command: &str, args: &[&str], timeout: Duration) -> E2eResult<String> {
        self.mobile_shell(command, args, timeout).await
    }

    async fn activate_app(&self, app_id: &str) -> E2eResult<()> {
        RemoteSession::activate_app(self, app_id).await
    }
}

/// Whether the app had a live process before activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Running,
    NotRunning,
}

/// Checks for a running app process, reusing the last `ps -A` listing for `ttl`
pub struct RunningAppProbe {
    ttl: Duration,
    listing: Mutex<Option<CacheEntry<String>>>,
}

impl RunningAppProbe {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            listing: Mutex::new(None),
        }
    }

    /// Any failure to list processes counts as "not running"
    pub async fn is_running(
        &self,
        session: &dyn AutomationSession,
        throttle: &ThrottleGuard,
        package: &str,
    ) -> bool {
        match self.process_list(session, throttle).await {
            Ok(listing) => listing.lines().any(|line| line.contains(package)),
            Err(e) => {
                warn!(package, "Failed to check the application: {}", e);
                false
            }
        }
    }

    async fn process_list(&self, session: &dyn AutomationSession, throttle: &ThrottleGuard) -> E2eResult<String> {
        let fresh = self
            .listing
            .lock()
            .as_ref()
            .filter(|entry| !entry.is_stale())
            .map(|entry| entry.value().clone());
        if let Some(listing) = fresh {
            return Ok(listing);
        }

        throttle.gate().await;
        let listing = session.shell("ps", &["-A"], PROCESS_LIST_TIMEOUT).await?;
        *self.listing.lock() = Some(CacheEntry::new(listing.clone(), self.ttl));
        Ok(listing)
    }

    /// Forget the cached listing
    pub fn invalidate(&self) {
        *self.listing.lock() = None;
    }
}

/// Activate `package`, logging whether it was already running.
///
/// Both branches issue the same activation: `activateApp` starts a stopped
/// app and resumes a backgrounded one. Activation errors are logged only.
pub async fn bring_to_foreground(
    session: &dyn AutomationSession,
    throttle: &ThrottleGuard,
    probe: &RunningAppProbe,
    package: &str,
) -> AppState {
    let state = if probe.is_running(session, throttle, package).await {
        info!(package, "Application is running in the background, switching to it");
        AppState::Running
    } else {
        info!(package, "Application is not running, starting it");
        AppState::NotRunning
    };

    throttle.gate().await;
    if let Err(e) = session.activate_app(package).await {
        warn!(package, "Failed to activate application: {}", e);
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::E2eError;
    use crate::throttle::ThrottleConfig;

    #[derive(Default)]
    struct FakeSession {
        listing: String,
        fail_shell: bool,
        fail_activate: bool,
        shell_calls: Mutex<usize>,
        activated: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AutomationSession for FakeSession {
        async fn shell(&self, command: &str, args: &[&str], _timeout: Duration) -> E2eResult<String> {
            assert_eq!(command, "ps");
            assert_eq!(args, ["-A"]);
            *self.shell_calls.lock() += 1;
            if self.fail_shell {
                return Err(E2eError::WebDriver {
                    error: "unknown error".to_string(),
                    message: "relaxed security is not enabled".to_string(),
                });
            }
            Ok(self.listing.clone())
        }

        async fn activate_app(&self, app_id: &str) -> E2eResult<()> {
            self.activated.lock().push(app_id.to_string());
            if self.fail_activate {
                return Err(E2eError::SessionNotCreated("gone".to_string()));
            }
            Ok(())
        }
    }

    const PS: &str = "USER PID PPID VSZ RSS WCHAN ADDR S NAME\n\
                      root 1 0 10000 2000 0 0 S init\n\
                      u0_a123 4321 300 1500000 90000 0 0 S com.foo\n";

    fn throttle() -> ThrottleGuard {
        ThrottleGuard::new(ThrottleConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_detection() {
        let session = FakeSession {
            listing: PS.to_string(),
            ..Default::default()
        };
        let probe = RunningAppProbe::new(Duration::from_secs(10));
        let throttle = throttle();

        assert!(probe.is_running(&session, &throttle, "com.foo").await);
        assert!(!probe.is_running(&session, &throttle, "com.bar").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_reused_within_ttl() {
        let session = FakeSession {
            listing: PS.to_string(),
            ..Default::default()
        };
        let probe = RunningAppProbe::new(Duration::from_secs(10));
        let throttle = throttle();

        probe.is_running(&session, &throttle, "com.foo").await;
        tokio::time::advance(Duration::from_secs(5)).await;
        probe.is_running(&session, &throttle, "com.foo").await;
        assert_eq!(*session.shell_calls.lock(), 1);
        assert_eq!(throttle.snapshot().await.request_counter, 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        probe.is_running(&session, &throttle, "com.foo").await;
        assert_eq!(*session.shell_calls.lock(), 2);
        assert_eq!(throttle.snapshot().await.request_counter, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refresh() {
        let session = FakeSession {
            listing: PS.to_string(),
            ..Default::default()
        };
        let probe = RunningAppProbe::new(Duration::from_secs(10));
        let throttle = throttle();

        probe.is_running(&session, &throttle, "com.foo").await;
        probe.invalidate();
        probe.is_running(&session, &throttle, "com.foo").await;
        assert_eq!(*session.shell_calls.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shell_failure_means_not_running() {
        let session = FakeSession {
            fail_shell: true,
            ..Default::default()
        };
        let probe = RunningAppProbe::new(Duration::from_secs(10));
        assert!(!probe.is_running(&session, &throttle(), "com.foo").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_activates_in_both_states() {
        let probe = RunningAppProbe::new(Duration::from_secs(10));
        let throttle = throttle();

        let running = FakeSession {
            listing: PS.to_string(),
            ..Default::default()
        };
        let state = bring_to_foreground(&running, &throttle, &probe, "com.foo").await;
        assert_eq!(state, AppState::Running);
        assert_eq!(*running.activated.lock(), vec!["com.foo".to_string()]);

        let stopped = FakeSession::default();
        let probe = RunningAppProbe::new(Duration::from_secs(10));
        let state = bring_to_foreground(&stopped, &throttle, &probe, "com.foo").await;
        assert_eq!(state, AppState::NotRunning);
        assert_eq!(*stopped.activated.lock(), vec!["com.foo".to_string()]);

        // probe + activation for each run
        assert_eq!(throttle.snapshot().await.request_counter, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_failure_is_not_fatal() {
        let session = FakeSession {
            listing: PS.to_string(),
            fail_activate: true,
            ..Default::default()
        };
        let probe = RunningAppProbe::new(Duration::from_secs(10));
        let state = bring_to_foreground(&session, &throttle(), &probe, "com.foo").await;
        assert_eq!(state, AppState::Running);
        assert_eq!(session.activated.lock().len(), 1);
    }
}
