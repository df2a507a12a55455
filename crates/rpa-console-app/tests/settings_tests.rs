//! Integration tests for settings parsing and backend composition.

use clap::Parser;
use rpa_console_app::{
    AppError, ConsoleSettings, build_console, config_store_from_settings, identity_from_settings,
};
use rpa_console_auth::UserIdentity;
use rpa_console_store::ConfigStoreClient;

#[derive(Parser)]
struct Harness {
    #[command(flatten)]
    settings: ConsoleSettings,
}

fn parse(args: &[&str]) -> Result<ConsoleSettings, clap::Error> {
    Harness::try_parse_from(std::iter::once("rpa-console").chain(args.iter().copied()))
        .map(|harness| harness.settings)
}

#[test]
fn settings_tests_flags_override_defaults() {
    let settings = parse(&[
        "--api-base",
        "http://rpa.internal:9000",
        "--poll-interval-ms",
        "250",
        "--stale-after-polls",
        "4",
    ])
    .expect("flags should parse");

    assert_eq!(settings.api_base, "http://rpa.internal:9000");
    let controller = settings.controller_config();
    assert_eq!(controller.poll_interval.as_millis(), 250);
    assert_eq!(controller.stale_after_polls, Some(4));
}

#[test]
fn settings_tests_rejects_too_fast_polling() {
    assert!(parse(&["--poll-interval-ms", "10"]).is_err());
}

#[test]
fn settings_tests_zero_stale_limit_disables_cutover() {
    let mut settings = ConsoleSettings::with_api_base("http://localhost:8888");
    settings.stale_after_polls = Some(0);
    assert_eq!(settings.controller_config().stale_after_polls, None);
}

#[test]
fn settings_tests_store_dir_selects_file_backend() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let mut settings = ConsoleSettings::with_api_base("http://localhost:8888");
    settings.store_dir = Some(dir.path().to_path_buf());

    let store = ConfigStoreClient::new(config_store_from_settings(&settings).expect("store"));
    let identity = UserIdentity::new("uid-9", "").expect("identity");
    store
        .get_or_create(&identity, chrono::Utc::now())
        .expect("record should be created");

    assert!(dir.path().join("user_configs/uid-9.json").exists());
}

#[test]
fn settings_tests_missing_user_means_signed_out() {
    let settings = ConsoleSettings::with_api_base("http://localhost:8888");
    let provider = identity_from_settings(&settings).expect("provider");
    assert!(provider.current_session().expect("session").is_none());
}

#[test]
fn settings_tests_invalid_base_url_fails_composition() {
    let settings = ConsoleSettings::with_api_base("not a url");
    assert!(matches!(build_console(&settings), Err(AppError::Client(_))));
}
