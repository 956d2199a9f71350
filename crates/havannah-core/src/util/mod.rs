pub mod panic;

use std::str::FromStr;

/// Read `name` from the environment and parse it.
///
/// Unset variables yield `None`. Values that fail to parse are reported with
/// `log::warn!` and also yield `None`, so a typo never aborts a long solve.
pub fn env_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {name}={raw:?}: cannot parse value");
            None
        }
    }
}

/// Boolean switches accept `1/0`, `true/false`, `on/off`, `yes/no`.
pub fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => {
            log::warn!("ignoring {name}={raw:?}: expected a boolean");
            None
        }
    }
}

/// Check if running in CI environment
///
/// Returns true if either CI or GITHUB_ACTIONS environment variable is set.
/// Timing-sensitive tests use this to shorten their budgets.
#[inline]
pub fn is_ci_environment() -> bool {
    std::env::var("CI").is_ok() || std::env::var("GITHUB_ACTIONS").is_ok()
}
