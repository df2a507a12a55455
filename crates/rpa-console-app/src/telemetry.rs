//! Tracing setup and log-safe text helpers.

use tracing_subscriber::EnvFilter;

const SENSITIVE_KEYS: [&str; 5] = ["password", "secret", "token", "authorization", "bearer"];

/// Installs the global `fmt` subscriber, filtered by `RUST_LOG` (default
/// `info`). Later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Redacts common secret markers in log-safe output.
///
/// Everything after the first sensitive key is dropped.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for key in SENSITIVE_KEYS {
        redacted = redact_key_value(&redacted, key);
    }
    redacted
}

fn redact_key_value(input: &str, key: &str) -> String {
    let lower = input.to_ascii_lowercase();
    if let Some(position) = lower.find(key) {
        let prefix = &input[..position];
        return format!("{prefix}{key}=<redacted>");
    }
    input.to_string()
}
