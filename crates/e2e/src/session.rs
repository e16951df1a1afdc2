//! Session bootstrap
//!
//! Composes launcher resolution, capability assembly, the remote session and
//! foregrounding into a single `create_session` call.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::bridge::{AdbCommand, CommandRunner, ProcessInvoker};
use crate::capabilities::SessionCapabilities;
use crate::config::DroidgateConfig;
use crate::error::E2eResult;
use crate::foreground::{bring_to_foreground, AppState, RunningAppProbe};
use crate::resolver::LauncherResolver;
use crate::throttle::{DeviceLog, ThrottleConfig, ThrottleGuard};
use crate::webdriver::{RemoteSession, WebDriverClient};

/// A ready Appium session with the app in the foreground
#[derive(Debug)]
pub struct AppSession {
    remote: RemoteSession,
    package: String,
    activity: Option<String>,
    capabilities: SessionCapabilities,
    app_state: AppState,
    last_activity: Mutex<Instant>,
}

impl AppSession {
    /// Wrap an open remote session; the activity timestamp starts now
    fn new(
        remote: RemoteSession,
        package: impl Into<String>,
        activity: Option<String>,
        capabilities: SessionCapabilities,
        app_state: AppState,
    ) -> Self {
        Self {
            remote,
            package: package.into(),
            activity,
            capabilities,
            app_state,
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        self.remote.id()
    }

    pub fn endpoint(&self) -> &str {
        self.remote.endpoint()
    }

    pub fn remote(&self) -> &RemoteSession {
        &self.remote
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Launcher activity sent as `appium:appActivity`, if one was resolved
    pub fn activity(&self) -> Option<&str> {
        self.activity.as_deref()
    }

    /// Capabilities sent with the new-session request
    pub fn capabilities(&self) -> &SessionCapabilities {
        &self.capabilities
    }

    /// Whether the app was already running when the session opened
    pub fn app_state(&self) -> AppState {
        self.app_state
    }

    /// Record activity on the session
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity())
    }

    /// Delete the remote session
    pub async fn close(self) -> E2eResult<()> {
        self.remote.delete().await
    }
}

/// Opens [`AppSession`]s for one configured device and app
pub struct SessionBootstrapper {
    config: DroidgateConfig,
    resolver: LauncherResolver,
    throttle: Arc<ThrottleGuard>,
    probe: RunningAppProbe,
    client: WebDriverClient,
}

impl SessionBootstrapper {
    /// Bootstrapper over the real device bridge
    pub fn new(config: DroidgateConfig) -> E2eResult<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessInvoker::new());

        let mut throttle = ThrottleGuard::new(ThrottleConfig::from(&config.throttle));
        if config.throttle.device_log {
            throttle = throttle.with_device_log(DeviceLog::new(
                runner.clone(),
                AdbCommand::new(config.device.bridge_path.as_str()),
                config.command_timeout(),
            ));
        }

        Self::with_parts(config, runner, Arc::new(throttle))
    }

    /// Bootstrapper with an injected bridge runner and throttle guard
    pub fn with_parts(
        config: DroidgateConfig,
        runner: Arc<dyn CommandRunner>,
        throttle: Arc<ThrottleGuard>,
    ) -> E2eResult<Self> {
        config.validate()?;

        let resolver = LauncherResolver::new(
            runner,
            config.device.bridge_path.as_str(),
            config.command_timeout(),
        );
        let client = WebDriverClient::new(
            &config.appium.endpoint,
            Duration::from_secs(config.appium.request_timeout_secs),
        )?;
        let probe = RunningAppProbe::new(config.running_cache_ttl());

        Ok(Self {
            config,
            resolver,
            throttle,
            probe,
            client,
        })
    }

    pub fn config(&self) -> &DroidgateConfig {
        &self.config
    }

    pub fn throttle(&self) -> &Arc<ThrottleGuard> {
        &self.throttle
    }

    /// The configured activity override, else the device lookup
    pub async fn resolve_activity(&self) -> E2eResult<Option<String>> {
        if let Some(activity) = &self.config.app.activity {
            info!(package = %self.config.app.package, activity = %activity, "Using configured launcher activity");
            return Ok(Some(activity.clone()));
        }

        self.resolver
            .resolve(&self.config.app.package, &self.config.device.device_id)
            .await
    }

    pub fn capabilities(&self, activity: Option<&str>) -> SessionCapabilities {
        SessionCapabilities::android(&self.config, activity)
    }

    /// Open a session and bring the app to the foreground.
    ///
    /// Only launcher lookup (when the bridge cannot run) and opening the
    /// session itself can fail; later steps are logged and skipped.
    pub async fn create_session(&self) -> E2eResult<AppSession> {
        let package = self.config.app.package.as_str();
        let activity = self.resolve_activity().await?;
        let capabilities = self.capabilities(activity.as_deref());

        info!(
            package,
            activity = activity.as_deref().unwrap_or("<appium default>"),
            device = %self.config.device.device_id,
            "Starting Appium session"
        );

        let remote = self.client.new_session(&capabilities).await?;

        let implicit_wait = Duration::from_secs(self.config.appium.implicit_wait_secs);
        if let Err(e) = remote.set_implicit_wait(implicit_wait).await {
            warn!(session_id = %remote.id(), "Failed to set implicit wait: {}", e);
        }

        sleep(Duration::from_millis(self.config.appium.settle_ms)).await;

        let app_state = bring_to_foreground(&remote, &self.throttle, &self.probe, package).await;

        let session = AppSession::new(remote, package, activity, capabilities, app_state);

        info!(session_id = %session.id(), ?app_state, "Session ready");
        Ok(session)
    }

    /// Forget the cached process listing, e.g. after the app was killed
    pub fn invalidate_process_cache(&self) {
        self.probe.invalidate();
    }
}
