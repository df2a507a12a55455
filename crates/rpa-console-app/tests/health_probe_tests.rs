//! Integration tests for the health probe and its effect on checks.

mod common;

use std::time::Duration;

use common::{FakeServer, complete_config, console};
use rpa_console_app::{probe, probe_within};
use rpa_console_checks::all_pass;
use rpa_console_client::RpaClient;
use rpa_console_core::{CheckKey, CheckStatus};

#[tokio::test]
async fn health_probe_tests_maps_status_codes() {
    let server = FakeServer::new();
    server.once("GET", "/api/health", 200, "ok");
    server.once("GET", "/api/health", 500, "down");
    server.fail_once("GET", "/api/health");
    let client = RpaClient::new(server.clone());

    assert!(probe(&client).await);
    assert!(!probe(&client).await);
    assert!(!probe(&client).await);
}

#[tokio::test(start_paused = true)]
async fn health_probe_tests_timeout_reads_unhealthy() {
    let server = FakeServer::new();
    server.once_delayed("GET", "/api/health", 200, "ok", Duration::from_secs(10));
    let client = RpaClient::new(server.clone());

    assert!(!probe_within(&client, Duration::from_secs(3)).await);
}

#[tokio::test(start_paused = true)]
async fn health_probe_tests_failing_probe_fails_only_server_check() {
    let server = FakeServer::new();
    server.always("GET", "/api/health", 503, "");
    let console = console(&server, vec![complete_config()]);

    let checks = console.refresh_checks().await.expect("checks should refresh");

    assert!(!all_pass(&checks));
    for item in &checks {
        let expected = if item.key == CheckKey::Server {
            CheckStatus::Fail
        } else {
            CheckStatus::Pass
        };
        assert_eq!(item.pass, expected, "unexpected result for {}", item.key);
    }
    assert_eq!(console.view().server_connected, Some(false));
}

#[tokio::test(start_paused = true)]
async fn health_probe_tests_monitor_updates_indicator() {
    let server = FakeServer::new();
    server.once("GET", "/api/health", 200, "ok");
    server.always("GET", "/api/health", 500, "");
    let console = console(&server, vec![complete_config()]);

    console.start_health_monitor(Duration::from_secs(30));
    assert_eq!(console.view().server_connected, None);

    tokio::time::sleep(Duration::from_secs(31)).await;
    common::settle().await;
    assert_eq!(console.view().server_connected, Some(true));

    tokio::time::sleep(Duration::from_secs(30)).await;
    common::settle().await;
    assert_eq!(console.view().server_connected, Some(false));

    console.stop_health_monitor();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(server.count("GET", "/api/health"), 2);
}
