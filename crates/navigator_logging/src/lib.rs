#![deny(missing_docs)]
//! Shared logging utilities for the navigator workspace.
//!
//! This crate provides the `nav_*` logging macros used across the codebase,
//! a minimal test initializer for the global logger, and helpers that keep
//! credentials out of log lines.

/// Placeholder written in place of a redacted credential.
pub const REDACTED: &str = "<redacted>";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! nav_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! nav_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! nav_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! nav_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! nav_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Replaces the credential following every `Bearer ` marker with [`REDACTED`].
///
/// The credential ends at the first whitespace, quote or comma.
pub fn redact_bearer(text: &str) -> String {
    const MARKER: &str = "Bearer ";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(MARKER) {
        let (head, tail) = rest.split_at(pos + MARKER.len());
        out.push_str(head);
        let end = tail
            .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',')
            .unwrap_or(tail.len());
        if end > 0 {
            out.push_str(REDACTED);
        }
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

/// Returns a short, log-safe fingerprint of a secret: its length only.
pub fn secret_fingerprint(secret: &str) -> String {
    if secret.is_empty() {
        "<empty>".to_string()
    } else {
        format!("{REDACTED}(len={})", secret.len())
    }
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
