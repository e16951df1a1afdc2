//! Activity name extraction from noisy adb output

use once_cell::sync::Lazy;
use regex::Regex;

static QUALIFIED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_]\w*(\.[A-Za-z0-9_]\w*)+$").expect("valid regex"));

/// Extract a fully-qualified activity (`com.pkg.MainActivity`) from one line.
///
/// Accepted shapes:
/// - `com.pkg/fully.qualified.Activity`
/// - `com.pkg/.Activity`
/// - `com.pkg/Activity`
/// - `fully.qualified.Activity`
/// - `.Activity` (qualified with `app_package`)
///
/// Anything else, including the bare package name, yields `None`.
pub fn extract(line: &str, app_package: &str) -> Option<String> {
    let line = line.trim();

    if let Some((pkg, act)) = line.split_once('/') {
        let pkg = pkg.trim();
        let act = act.trim();
        if pkg.is_empty() {
            return None;
        }
        if act.starts_with('.') {
            return Some(format!("{pkg}{act}"));
        }
        if act.contains('.') {
            return Some(act.to_string());
        }
        return Some(format!("{pkg}.{act}"));
    }

    if line.starts_with('.') {
        return Some(format!("{app_package}{line}"));
    }

    // A bare package name is itself a dotted identifier, so rule it out first
    if line == app_package {
        return None;
    }

    if QUALIFIED_NAME.is_match(line) {
        return Some(line.to_string());
    }

    None
}

/// Qualify a `name=` attribute value; dot-prefixed names are package-relative
pub fn qualify(name: &str, app_package: &str) -> String {
    if name.starts_with('.') {
        format!("{app_package}{name}")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_relative_component() {
        assert_eq!(extract("com.foo/.Main", "com.foo").as_deref(), Some("com.foo.Main"));
    }

    #[test]
    fn test_simple_class_component() {
        assert_eq!(extract("com.foo/Main", "com.foo").as_deref(), Some("com.foo.Main"));
    }

    #[test]
    fn test_fully_qualified_component() {
        assert_eq!(
            extract("com.foo/com.foo.ui.SplashActivity", "com.foo").as_deref(),
            Some("com.foo.ui.SplashActivity")
        );
    }

    #[test]
    fn test_component_from_other_package_is_kept() {
        assert_eq!(
            extract("com.foo/org.lib.Launcher", "com.foo").as_deref(),
            Some("org.lib.Launcher")
        );
    }

    #[test]
    fn test_bare_dotted_identifier_unchanged() {
        assert_eq!(extract("com.foo.Main", "com.foo").as_deref(), Some("com.foo.Main"));
    }

    #[test]
    fn test_package_only_yields_nothing() {
        assert_eq!(extract("com.foo", "com.foo"), None);
        assert_eq!(extract("  com.foo  ", "com.foo"), None);
        assert_eq!(extract("foo", "foo"), None);
    }

    #[test]
    fn test_dot_prefixed_line() {
        assert_eq!(extract(".MainActivity", "com.foo").as_deref(), Some("com.foo.MainActivity"));
    }

    #[test]
    fn test_empty_package_before_slash() {
        assert_eq!(extract("/.Main", "com.foo"), None);
        assert_eq!(extract("  /Main", "com.foo"), None);
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(extract("  com.foo / .Main  ", "com.foo").as_deref(), Some("com.foo.Main"));
    }

    #[test]
    fn test_noise_yields_nothing() {
        assert_eq!(extract("priority=0 preferredOrder=0 match=0x108000", "com.foo"), None);
        assert_eq!(extract("No activity found", "com.foo"), None);
        assert_eq!(extract("", "com.foo"), None);
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify(".Main", "com.foo"), "com.foo.Main");
        assert_eq!(qualify("com.foo.Main", "com.foo"), "com.foo.Main");
    }
}
