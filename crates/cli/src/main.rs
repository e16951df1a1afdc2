//! Droidgate CLI - Main Entry Point
//!
//! Resolves launcher activities, previews capabilities and bootstraps Appium
//! sessions from the command line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use droidgate_e2e::DroidgateConfig;

mod commands;
mod output;

use commands::{config, session};

/// Droidgate - Appium session bootstrap for Android
#[derive(Parser)]
#[command(name = "droidgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "droidgate.toml", env = "DROIDGATE_CONFIG", global = true)]
    config: PathBuf,

    /// Device serial
    #[arg(short, long, env = "ANDROID_SERIAL", global = true)]
    device: Option<String>,

    /// Package of the app under test
    #[arg(short, long, global = true)]
    package: Option<String>,

    /// Appium server URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up the app's launcher activity on the device
    Resolve,

    /// Show the capabilities a new session would send
    Caps(session::CapsArgs),

    /// Open a session and bring the app to the foreground
    Start(session::StartArgs),

    /// Delete a session left open by `start --keep`
    Stop(session::StopArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

impl Cli {
    /// Configuration file contents with command-line overrides applied
    fn effective_config(&self) -> Result<DroidgateConfig> {
        let mut config = DroidgateConfig::load(&self.config)
            .with_context(|| format!("Failed to load {}", self.config.display()))?;

        if let Some(device) = &self.device {
            config.device.device_id = device.clone();
        }
        if let Some(package) = &self.package {
            config.app.package = package.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.appium.endpoint = endpoint.clone();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.effective_config()?;

    match cli.command {
        Commands::Resolve => session::resolve(config, cli.format).await?,
        Commands::Caps(args) => session::caps(args, config, cli.format).await?,
        Commands::Start(args) => session::start(args, config, cli.format).await?,
        Commands::Stop(args) => session::stop(args, config).await?,
        Commands::Config(args) => config::execute(args, &config, &cli.config)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("droidgate.toml");
        std::fs::write(
            &path,
            r#"
[device]
device_id = "emulator-5556"

[app]
package = "com.foo"
"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "droidgate",
            "--config",
            path.to_str().unwrap(),
            "--device",
            "R58M123ABC",
            "--endpoint",
            "http://10.0.2.2:4723",
            "caps",
            "--skip-resolve",
        ])
        .unwrap();

        let config = cli.effective_config().unwrap();
        assert_eq!(config.device.device_id, "R58M123ABC");
        assert_eq!(config.app.package, "com.foo");
        assert_eq!(config.appium.endpoint, "http://10.0.2.2:4723");
    }

    #[test]
    fn test_stop_takes_session_id() {
        let cli = Cli::try_parse_from(["droidgate", "stop", "5c1e8a3f"]).unwrap();
        assert!(matches!(cli.command, Commands::Stop(ref args) if args.session_id == "5c1e8a3f"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["droidgate", "start", "--keep", "--package", "com.bar", "--format", "json"])
            .unwrap();
        assert_eq!(cli.package.as_deref(), Some("com.bar"));
        assert!(matches!(cli.command, Commands::Start(ref args) if args.keep));
        assert!(matches!(cli.format, output::OutputFormat::Json));
    }
}
