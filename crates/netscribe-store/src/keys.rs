//! Well-known storage keys.

/// Network target substring (text).
pub const API_TARGET_URL: &str = "apiTargetUrl";
/// Console/page target substring (text).
pub const CONSOLE_TARGET_URL: &str = "consoleTargetUrl";
/// Capture on/off flag (boolean).
pub const IS_LOGGING_ACTIVE: &str = "isLoggingActive";
/// Ordered collection of captured console lines.
pub const CONSOLE_LOGS: &str = "consoleLogs";
/// Ordered collection of page-side network records.
pub const NETWORK_LOGS: &str = "networkLogs";

/// Keys that hold collections rather than scalar values.
pub fn is_collection(key: &str) -> bool {
    matches!(key, CONSOLE_LOGS | NETWORK_LOGS)
}
