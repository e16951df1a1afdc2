//! Device bridge (adb) process invocation
//!
//! Every call to the bridge goes through [`CommandRunner`] so the resolver and
//! the throttle guard can be exercised against scripted output in tests.
//! [`ProcessInvoker`] is the real implementation.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};

/// Exit code reported for a bridge call that exceeded its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// stderr sentinel reported for a bridge call that exceeded its timeout
pub const TIMEOUT_SENTINEL: &str = "TimeoutExpired";

pub const INTENT_ACTION_MAIN: &str = "android.intent.action.MAIN";
pub const INTENT_CATEGORY_LAUNCHER: &str = "android.intent.category.LAUNCHER";

/// Outcome of a single bridge invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl DeviceCommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(TIMEOUT_EXIT_CODE, "", TIMEOUT_SENTINEL)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE && self.stderr == TIMEOUT_SENTINEL
    }

    /// stderr when present, stdout otherwise
    pub fn detail(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Runs a full command line (`argv[0]` is the program)
///
/// Implementations never fail on a non-zero exit code. A timeout is reported
/// as [`DeviceCommandResult::timeout`]. Only failing to start the program at
/// all is an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[String], timeout: Duration) -> E2eResult<DeviceCommandResult>;
}

/// Spawns the bridge as a child process
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessInvoker {
    async fn run(&self, argv: &[String], timeout: Duration) -> E2eResult<DeviceCommandResult> {
        let (program, args) = argv.split_first().ok_or(E2eError::EmptyCommand)?;

        debug!(command = %argv.join(" "), timeout_ms = timeout.as_millis() as u64, "Running bridge command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| E2eError::BridgeLaunch {
                program: program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout kills the child.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(DeviceCommandResult {
                    exit_code: exit_code(output.status),
                    stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
            Err(_) => {
                warn!(command = %argv.join(" "), "Bridge command timed out after {:?}", timeout);
                Ok(DeviceCommandResult::timeout())
            }
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

/// Builds bridge command lines for one device
#[derive(Debug, Clone)]
pub struct AdbCommand {
    program: String,
    serial: Option<String>,
}

impl AdbCommand {
    /// Commands without `-s`, routed to the bridge's default device
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            serial: None,
        }
    }

    pub fn for_device(program: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            serial: Some(serial.into()),
        }
    }

    /// `<adb> [-s <serial>] shell <args...>`
    pub fn shell<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![self.program.clone()];
        if let Some(serial) = &self.serial {
            argv.push("-s".to_string());
            argv.push(serial.clone());
        }
        argv.push("shell".to_string());
        argv.extend(args.into_iter().map(Into::into));
        argv
    }

    pub fn resolve_launcher_activity(&self, package: &str) -> Vec<String> {
        self.shell([
            "cmd",
            "package",
            "resolve-activity",
            "--brief",
            "-a",
            INTENT_ACTION_MAIN,
            "-c",
            INTENT_CATEGORY_LAUNCHER,
            package,
        ])
    }

    pub fn dumpsys_window(&self) -> Vec<String> {
        self.shell(["dumpsys", "window"])
    }

    pub fn dumpsys_package(&self, package: &str) -> Vec<String> {
        self.shell(["dumpsys", "package", package])
    }

    /// Write one line to the device system log
    pub fn log(&self, tag: &str, message: &str) -> Vec<String> {
        self.shell(["log", "-t", tag, message])
    }
}
