//! Launcher activity resolution
//!
//! Appium refuses to start a non-exported activity (SecurityException), so the
//! exported MAIN/LAUNCHER entry point is looked up before the session opens.
//! Three strategies are tried in order and the first hit wins:
//!
//! 1. `cmd package resolve-activity --brief` for MAIN/LAUNCHER
//! 2. `dumpsys window`, reading `mCurrentFocus`
//! 3. `dumpsys package <pkg>`, scanning for a MAIN action with a LAUNCHER category
//!
//! Finding nothing is not an error: Appium falls back to its own lookup when
//! `appium:appActivity` is absent.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::activity;
use crate::bridge::{AdbCommand, CommandRunner, INTENT_ACTION_MAIN, INTENT_CATEGORY_LAUNCHER};
use crate::error::E2eResult;

/// Lines scanned after a MAIN action when looking for LAUNCHER
pub const PACKAGE_DUMP_LOOKAHEAD: usize = 12;

static NAME_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"name=(\.?[A-Za-z_][\w.]*)").expect("valid regex"));

/// One way of asking the device for the launcher activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ResolveActivity,
    CurrentFocus,
    PackageDump,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::ResolveActivity,
        Strategy::CurrentFocus,
        Strategy::PackageDump,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ResolveActivity => "resolve-activity",
            Strategy::CurrentFocus => "current-focus",
            Strategy::PackageDump => "package-dump",
        }
    }

    fn command(&self, adb: &AdbCommand, package: &str) -> Vec<String> {
        match self {
            Strategy::ResolveActivity => adb.resolve_launcher_activity(package),
            Strategy::CurrentFocus => adb.dumpsys_window(),
            Strategy::PackageDump => adb.dumpsys_package(package),
        }
    }

    /// Parse this strategy's command output
    pub fn parse(&self, output: &str, package: &str) -> Option<String> {
        match self {
            Strategy::ResolveActivity => parse_resolve_activity(output, package),
            Strategy::CurrentFocus => parse_current_focus(output, package),
            Strategy::PackageDump => parse_package_dump(output, package),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the exported launcher activity of a package over the device bridge
pub struct LauncherResolver {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

impl LauncherResolver {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    /// Returns `Ok(None)` when every strategy came up empty. Only a bridge that
    /// cannot be launched at all is an error.
    pub async fn resolve(&self, package: &str, device_id: &str) -> E2eResult<Option<String>> {
        let adb = AdbCommand::for_device(&self.program, device_id);

        for strategy in Strategy::ALL {
            if let Some(activity) = self.attempt(strategy, &adb, package).await? {
                return Ok(Some(activity));
            }
        }

        warn!(package, "No launcher activity resolved, leaving appActivity to Appium");
        Ok(None)
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        adb: &AdbCommand,
        package: &str,
    ) -> E2eResult<Option<String>> {
        let argv = strategy.command(adb, package);
        let result = self.runner.run(&argv, self.timeout).await?;

        if !result.success() || result.stdout.is_empty() {
            info!(
                %strategy,
                exit_code = result.exit_code,
                "Strategy failed: {}",
                result.detail()
            );
            return Ok(None);
        }

        match strategy.parse(&result.stdout, package) {
            Some(activity) => {
                info!(%strategy, package, activity = %activity, "Resolved launcher activity");
                Ok(Some(activity))
            }
            None => {
                info!(%strategy, package, "Strategy returned output but no launcher activity");
                debug!(%strategy, output = %result.stdout, "Unparsable output");
                Ok(None)
            }
        }
    }
}

/// First line of `resolve-activity --brief` output that names a component
pub fn parse_resolve_activity(output: &str, package: &str) -> Option<String> {
    output.lines().find_map(|line| activity::extract(line, package))
}

/// Activity from the `mCurrentFocus` line of `dumpsys window`,
/// e.g. `mCurrentFocus=Window{1f2e3d u0 com.pkg/com.pkg.MainActivity}`
pub fn parse_current_focus(output: &str, package: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("mCurrentFocus") && line.contains(package) && line.contains('/'))
        .find_map(|line| activity::extract(focus_component(line), package))
}

fn focus_component(line: &str) -> &str {
    let tail = match line.split_once("u0 ") {
        Some((_, tail)) => tail,
        None => line.split_once('=').map(|(_, tail)| tail).unwrap_or(line),
    };
    let token = tail.split_whitespace().next().unwrap_or(tail);
    token.trim_end_matches('}')
}

/// Launcher activity from `dumpsys package <pkg>`
pub fn parse_package_dump(output: &str, package: &str) -> Option<String> {
    let main_marker = format!("action={INTENT_ACTION_MAIN}");
    let launcher_marker = format!("category={INTENT_CATEGORY_LAUNCHER}");
    let lines: Vec<&str> = output.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if !line.contains(&main_marker) {
            continue;
        }

        let window = &lines[i..(i + PACKAGE_DUMP_LOOKAHEAD).min(lines.len())];
        if !window.iter().any(|l| l.contains(&launcher_marker)) {
            continue;
        }

        for entry in window {
            if entry.contains('/') && entry.contains(package) {
                let component = entry
                    .split_whitespace()
                    .find(|token| token.contains('/'))
                    .and_then(|token| activity::extract(token, package));
                if component.is_some() {
                    return component;
                }
            }
            if let Some(caps) = NAME_ATTR.captures(entry) {
                return Some(activity::qualify(&caps[1], package));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_activity_skips_noise() {
        let output = "priority=0 preferredOrder=0 match=0x108000 specificIndex=-1 isDefault=true\n\
                      com.foo/.MainActivity";
        assert_eq!(
            parse_resolve_activity(output, "com.foo").as_deref(),
            Some("com.foo.MainActivity")
        );
    }

    #[test]
    fn test_resolve_activity_no_match() {
        assert_eq!(parse_resolve_activity("No activity found", "com.foo"), None);
    }

    #[test]
    fn test_current_focus_after_u0() {
        let output = "  mCurrentFocus=Window{1f2e3d u0 com.foo/com.foo.ui.HomeActivity}\n\
                      mFocusedApp=ActivityRecord{abc u0 com.foo/.ui.HomeActivity t12}";
        assert_eq!(
            parse_current_focus(output, "com.foo").as_deref(),
            Some("com.foo.ui.HomeActivity")
        );
    }

    #[test]
    fn test_current_focus_after_equals() {
        let output = "mCurrentFocus=com.foo/.Main";
        assert_eq!(parse_current_focus(output, "com.foo").as_deref(), Some("com.foo.Main"));
    }

    #[test]
    fn test_current_focus_other_app_ignored() {
        let output = "mCurrentFocus=Window{1f2e3d u0 com.android.launcher3/.Launcher}";
        assert_eq!(parse_current_focus(output, "com.foo"), None);
    }

    #[test]
    fn test_package_dump_component_line() {
        let output = "\
Activity Resolver Table:
  Non-Data Actions:
      action=android.intent.action.MAIN
        7a1b2c com.foo/.SplashActivity filter 9d8e7f
          category=android.intent.category.LAUNCHER
";
        assert_eq!(
            parse_package_dump(output, "com.foo").as_deref(),
            Some("com.foo.SplashActivity")
        );
    }

    #[test]
    fn test_package_dump_name_attribute() {
        let output = "\
    Activity #0:
      action=android.intent.action.MAIN
      category=android.intent.category.LAUNCHER
      name=.LauncherActivity
";
        assert_eq!(
            parse_package_dump(output, "com.foo").as_deref(),
            Some("com.foo.LauncherActivity")
        );
    }

    #[test]
    fn test_package_dump_requires_launcher_within_lookahead() {
        let mut output = String::from("action=android.intent.action.MAIN\n");
        for _ in 0..PACKAGE_DUMP_LOOKAHEAD {
            output.push_str("  filler\n");
        }
        output.push_str("category=android.intent.category.LAUNCHER\nname=com.foo.Late\n");
        assert_eq!(parse_package_dump(&output, "com.foo"), None);
    }

    #[test]
    fn test_package_dump_main_without_launcher() {
        let output = "\
action=android.intent.action.MAIN
category=android.intent.category.DEFAULT
name=com.foo.Internal
";
        assert_eq!(parse_package_dump(output, "com.foo"), None);
    }
}
