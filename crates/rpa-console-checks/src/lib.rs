#![warn(missing_docs)]
//! # rpa-console-checks
//!
//! ## Purpose
//! Evaluates the eight launch prerequisites for one configuration record.
//!
//! ## Responsibilities
//! - Normalize raw record fields (trim, whitespace stripping).
//! - Evaluate every prerequisite independently, without short-circuiting.
//! - Aggregate the results into one launch gate.
//!
//! ## Data flow
//! [`rpa_console_core::UserConfig`] + health probe outcome -> [`validate`] ->
//! ordered [`CheckItem`] list -> [`all_pass`] gate used by the run controller.
//!
//! ## Ownership and lifetimes
//! The validator borrows the record and returns owned items, so the caller can
//! replace its check list wholesale on every pass.
//!
//! ## Error model
//! Failed prerequisites are data, not errors. Nothing in this crate fails.
//!
//! ## Security and privacy notes
//! Hints are fixed per key and never echo field values, so passwords do not
//! leak into rendered check lists.

use std::sync::LazyLock;

use regex::Regex;
use rpa_console_core::{CheckItem, CheckKey, UserConfig};

/// Number of prerequisites evaluated per pass.
pub const CHECK_COUNT: usize = CheckKey::ALL.len();

/// Required application password length after whitespace removal.
pub const APP_PASSWORD_LEN: usize = 16;

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Evaluates all prerequisites in [`CheckKey::ALL`] order.
///
/// # Parameters
/// - `config`: Record read from the config store.
/// - `server_healthy`: Outcome of the liveness probe performed by the caller.
pub fn validate(config: &UserConfig, server_healthy: bool) -> Vec<CheckItem> {
    let email = config.email_config.address.trim();
    let app_password = strip_whitespace(&config.email_config.app_password);

    CheckKey::ALL
        .iter()
        .map(|&key| {
            let pass = match key {
                CheckKey::EmailFormat => is_email_shape(email),
                CheckKey::TargetMailbox => !email.is_empty(),
                CheckKey::AppPwd => is_app_password(&app_password),
                CheckKey::SitePwd => not_blank(&config.email_config.site_password),
                CheckKey::ApiUrl => not_blank(&config.sms_config.api_url),
                CheckKey::ApiId => not_blank(&config.sms_config.api_id),
                CheckKey::ApiPwd => not_blank(&config.sms_config.api_password),
                CheckKey::Server => server_healthy,
            };
            CheckItem::evaluated(key, pass)
        })
        .collect()
}

/// Returns the initial, not-yet-evaluated check list.
pub fn pending_checks() -> Vec<CheckItem> {
    CheckKey::ALL.iter().map(|&key| CheckItem::pending(key)).collect()
}

/// Marks every check failed; used when the record cannot be read at all.
pub fn failed_checks() -> Vec<CheckItem> {
    CheckKey::ALL
        .iter()
        .map(|&key| CheckItem::evaluated(key, false))
        .collect()
}

/// Returns `true` only when every item definitely passed.
///
/// An empty slice or a partial list never passes.
pub fn all_pass(checks: &[CheckItem]) -> bool {
    checks.len() == CHECK_COUNT && checks.iter().all(CheckItem::passed)
}

/// Keys of items that are failing or unknown, in display order.
pub fn outstanding(checks: &[CheckItem]) -> Vec<CheckKey> {
    checks
        .iter()
        .filter(|item| !item.passed())
        .map(|item| item.key)
        .collect()
}

/// Returns `true` for a `local@domain.tld` shaped address.
pub fn is_email_shape(address: &str) -> bool {
    !address.is_empty() && EMAIL_SHAPE.is_match(address)
}

/// Returns `true` for exactly 16 ASCII alphanumerics.
///
/// Callers pass the value with whitespace already removed.
pub fn is_app_password(stripped: &str) -> bool {
    stripped.chars().count() == APP_PASSWORD_LEN
        && stripped.chars().all(|ch| ch.is_ascii_alphanumeric())
}

/// Removes every whitespace character, including interior ones.
pub fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|ch| !ch.is_whitespace()).collect()
}

fn not_blank(raw: &str) -> bool {
    !raw.trim().is_empty()
}

#[cfg(test)]
mod tests {
    //! Unit tests for individual prerequisite rules.

    use super::*;

    #[test]
    fn app_password_accepts_spaced_groups() {
        assert!(is_app_password(&strip_whitespace("abcd 1234efgh5678")));
        assert!(is_app_password(&strip_whitespace("abcd efgh ijkl mnop")));
        assert!(!is_app_password(&strip_whitespace("abcd-1234efgh567")));
        assert!(!is_app_password("abcd1234efgh567"));
        assert!(!is_app_password("abcd1234efgh56789"));
    }

    #[test]
    fn email_shape_needs_dotted_domain() {
        assert!(is_email_shape("a@b.co"));
        assert!(!is_email_shape("a@b"));
        assert!(!is_email_shape("a @b.co"));
        assert!(!is_email_shape("a@@b.co"));
        assert!(!is_email_shape(""));
    }

    #[test]
    fn pending_list_never_passes() {
        let pending = pending_checks();
        assert_eq!(pending.len(), CHECK_COUNT);
        assert!(!all_pass(&pending));
        assert_eq!(outstanding(&pending), CheckKey::ALL.to_vec());
    }
}
