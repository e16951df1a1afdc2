//! Session Commands
//!
//! Launcher lookup, capability preview and session bootstrap.

use anyhow::{Context, Result};
use clap::Args;
use droidgate_e2e::{AppState, DroidgateConfig, SessionBootstrapper, WebDriverClient};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use crate::output::{print_info, print_item, print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct CapsArgs {
    /// Leave out appActivity instead of asking the device for it
    #[arg(long)]
    pub skip_resolve: bool,
}

#[derive(Args)]
pub struct StartArgs {
    /// Leave the session open instead of deleting it
    #[arg(long)]
    pub keep: bool,
}

#[derive(Args)]
pub struct StopArgs {
    /// Id of a session left open with `start --keep`
    pub session_id: String,
}

/// Launcher lookup result for display
#[derive(Serialize)]
pub struct ActivityInfo {
    pub package: String,
    pub device: String,
    pub activity: Option<String>,
}

impl TableDisplay for ActivityInfo {
    fn headers() -> Vec<&'static str> {
        vec!["Package", "Device", "Launcher Activity"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.package.clone(),
            self.device.clone(),
            self.activity.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }
}

/// One capability for display
#[derive(Serialize)]
pub struct CapabilityRow {
    pub name: String,
    pub value: Value,
}

impl TableDisplay for CapabilityRow {
    fn headers() -> Vec<&'static str> {
        vec!["Capability", "Value"]
    }

    fn row(&self) -> Vec<String> {
        let value = match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        vec![self.name.clone(), value]
    }
}

/// Opened session for display
#[derive(Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub endpoint: String,
    pub package: String,
    pub activity: Option<String>,
    pub app_state: AppState,
    pub throttled_requests: u64,
    /// Capabilities as echoed by the server (JSON output only)
    #[serde(skip_serializing_if = "Value::is_null")]
    pub server_capabilities: Value,
}

impl TableDisplay for SessionInfo {
    fn headers() -> Vec<&'static str> {
        vec!["Session", "Endpoint", "Package", "Activity", "App State", "Requests"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.session_id.clone(),
            self.endpoint.clone(),
            self.package.clone(),
            self.activity.clone().unwrap_or_else(|| "-".to_string()),
            match self.app_state {
                AppState::Running => "resumed".to_string(),
                AppState::NotRunning => "started".to_string(),
            },
            self.throttled_requests.to_string(),
        ]
    }
}

fn bootstrapper(config: DroidgateConfig) -> Result<SessionBootstrapper> {
    SessionBootstrapper::new(config).context("Cannot prepare session bootstrap")
}

pub async fn resolve(config: DroidgateConfig, format: OutputFormat) -> Result<()> {
    let bootstrapper = bootstrapper(config)?;
    let activity = bootstrapper
        .resolve_activity()
        .await
        .context("Failed to query the device bridge")?;

    info!(resolved = activity.is_some(), "Launcher lookup finished");
    if activity.is_none() {
        print_warning("No launcher activity found, Appium will choose one");
    }

    let config = bootstrapper.config();
    print_item(
        &ActivityInfo {
            package: config.app.package.clone(),
            device: config.device.device_id.clone(),
            activity,
        },
        format,
    );
    Ok(())
}

pub async fn caps(args: CapsArgs, config: DroidgateConfig, format: OutputFormat) -> Result<()> {
    let bootstrapper = bootstrapper(config)?;
    let activity = if args.skip_resolve {
        bootstrapper.config().app.activity.clone()
    } else {
        bootstrapper
            .resolve_activity()
            .await
            .context("Failed to query the device bridge")?
    };

    let caps = bootstrapper.capabilities(activity.as_deref());

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&caps)?);
        return Ok(());
    }

    let rows: Vec<CapabilityRow> = caps
        .iter()
        .map(|(name, value)| CapabilityRow {
            name: name.clone(),
            value: value.clone(),
        })
        .collect();
    print_list(&rows, format);
    Ok(())
}

pub async fn start(args: StartArgs, config: DroidgateConfig, format: OutputFormat) -> Result<()> {
    let bootstrapper = bootstrapper(config)?;
    let session = bootstrapper
        .create_session()
        .await
        .context("Failed to start Appium session")?;

    let throttle = bootstrapper.throttle();
    let info = SessionInfo {
        session_id: session.id().to_string(),
        endpoint: session.endpoint().to_string(),
        package: session.package().to_string(),
        activity: session.activity().map(str::to_string),
        app_state: session.app_state(),
        throttled_requests: throttle.snapshot().await.request_counter,
        server_capabilities: session.remote().capabilities().clone(),
    };
    info!(
        session_id = %info.session_id,
        requests = info.throttled_requests,
        min_interval_ms = throttle.config().min_interval.as_millis() as u64,
        "Bootstrap complete"
    );
    print_item(&info, format);

    if args.keep {
        print_info(&format!(
            "Session {} left open at {}, close it with `droidgate stop {}`",
            info.session_id, info.endpoint, info.session_id
        ));
    } else {
        session.close().await.context("Failed to delete Appium session")?;
        info!(session_id = %info.session_id, "Session deleted");
        print_success(&format!("Session {} closed", info.session_id));
    }

    Ok(())
}

pub async fn stop(args: StopArgs, config: DroidgateConfig) -> Result<()> {
    let client = WebDriverClient::new(
        &config.appium.endpoint,
        Duration::from_secs(config.appium.request_timeout_secs),
    )
    .context("Cannot create Appium client")?;

    client
        .attach(args.session_id.as_str())
        .delete()
        .await
        .with_context(|| format!("Failed to delete session {}", args.session_id))?;

    info!(session_id = %args.session_id, endpoint = %client.endpoint(), "Session deleted");
    print_success(&format!("Session {} closed", args.session_id));
    Ok(())
}
