//! Integration tests for the run lifecycle and poll discipline.

mod common;

use std::time::Duration;

use common::{FakeServer, POLL, USER_ID, controller_config, passing_checks, settle, status_path};
use rpa_console_app::{RunController, RunControllerConfig, RunRequestError, StartRejected};
use rpa_console_client::RpaClient;
use rpa_console_core::{CheckItem, CheckKey, RunMode, RunPhase};
use std::sync::Arc;

const START: &str = "/api/rpa/start";
const OK: &str = r#"{"success":true}"#;
const RUNNING: &str = r#"{"success":true,"status":"running","logCount":1}"#;

fn controller(server: &Arc<FakeServer>) -> RunController {
    RunController::new(RpaClient::new(server.clone()), controller_config())
}

async fn started(server: &Arc<FakeServer>) -> RunController {
    server.always("POST", START, 200, OK);
    let controller = controller(server);
    let snapshot = controller
        .start(Some(USER_ID), &passing_checks(), None)
        .await
        .expect("start should be accepted");
    assert_eq!(snapshot.phase, RunPhase::Running);
    controller
}

async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_incomplete_checks_issue_no_request() {
    let server = FakeServer::new();
    let controller = controller(&server);
    let mut checks = passing_checks();
    checks[2] = CheckItem::evaluated(CheckKey::AppPwd, false);

    let result = controller.start(Some(USER_ID), &checks, None).await;

    assert_eq!(
        result,
        Err(StartRejected::ValidationIncomplete(vec![CheckKey::AppPwd]))
    );
    assert_eq!(server.total(), 0);
    assert_eq!(controller.phase(), RunPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_pending_checks_block_start() {
    let server = FakeServer::new();
    let controller = controller(&server);
    let pending: Vec<CheckItem> = CheckKey::ALL.iter().map(|key| CheckItem::pending(*key)).collect();

    assert!(controller.start(Some(USER_ID), &pending, None).await.is_err());
    assert_eq!(server.total(), 0);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_unbound_user_is_rejected() {
    let server = FakeServer::new();
    let controller = controller(&server);

    let result = controller.start(None, &passing_checks(), None).await;

    assert_eq!(result, Err(StartRejected::Unauthenticated));
    assert_eq!(server.total(), 0);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_start_sends_mode_body() {
    let server = FakeServer::new();
    server.always("POST", START, 200, OK);
    server.always("GET", &status_path(), 200, RUNNING);
    let controller = controller(&server);

    let mode = RunMode::continuous(60).expect("valid interval");
    controller
        .start(Some(USER_ID), &passing_checks(), Some(mode))
        .await
        .expect("start should be accepted");

    let body = server.requests()[0].body.clone().expect("start body");
    assert_eq!(body["userUid"], USER_ID);
    assert_eq!(body["mode"], "2");
    assert_eq!(body["interval"], 60);
    controller.teardown();
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_running_polls_until_teardown() {
    let server = FakeServer::new();
    server.always("GET", &status_path(), 200, RUNNING);
    let controller = started(&server).await;

    let snapshot = controller.snapshot();
    assert!(snapshot.polling);
    assert!(snapshot.started_at.is_some());
    assert_eq!(server.count("GET", &status_path()), 0);

    advance(POLL * 3 + Duration::from_millis(1)).await;
    assert_eq!(server.count("GET", &status_path()), 3);
    assert_eq!(controller.snapshot().status_text, "Running / Logs: 1");

    controller.teardown();
    advance(POLL * 5).await;

    assert_eq!(server.count("GET", &status_path()), 3);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, RunPhase::Idle);
    assert!(!snapshot.polling);
    assert!(snapshot.started_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_completed_status_ends_polling() {
    let server = FakeServer::new();
    server.once("GET", &status_path(), 200, RUNNING);
    server.always("GET", &status_path(), 200, r#"{"success":true,"status":"completed"}"#);
    let controller = started(&server).await;

    advance(POLL * 2 + Duration::from_millis(1)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, RunPhase::Stopped);
    assert!(!snapshot.polling);
    assert!(snapshot.started_at.is_some());

    advance(POLL * 4).await;
    assert_eq!(server.count("GET", &status_path()), 2);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_remote_error_keeps_message() {
    let server = FakeServer::new();
    server.always(
        "GET",
        &status_path(),
        200,
        r#"{"success":true,"status":"error","error":"login failed"}"#,
    );
    let controller = started(&server).await;

    advance(POLL + Duration::from_millis(1)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, RunPhase::Error);
    assert_eq!(snapshot.last_error.as_deref(), Some("login failed"));
    assert_eq!(snapshot.status_text, "Error: login failed");
    assert!(!snapshot.polling);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_failed_ticks_are_swallowed() {
    let server = FakeServer::new();
    server.fail_once("GET", &status_path());
    server.once("GET", &status_path(), 200, "<html>gateway</html>");
    server.once("GET", &status_path(), 200, r#"{"success":false,"error":"busy"}"#);
    server.always("GET", &status_path(), 200, RUNNING);
    let controller = started(&server).await;

    advance(POLL * 3 + Duration::from_millis(1)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, RunPhase::Running);
    assert!(snapshot.polling);
    assert_eq!(snapshot.status_text, "Running");

    advance(POLL).await;
    assert_eq!(server.count("GET", &status_path()), 4);
    assert_eq!(controller.snapshot().status_text, "Running / Logs: 1");
    controller.teardown();
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_not_running_is_not_terminal() {
    let server = FakeServer::new();
    server.always("GET", &status_path(), 200, r#"{"success":true,"status":"not_running"}"#);
    let controller = started(&server).await;

    advance(POLL * 2 + Duration::from_millis(1)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, RunPhase::Running);
    assert_eq!(snapshot.status_text, "Not running");
    controller.teardown();
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_start_failure_surfaces_error() {
    let server = FakeServer::new();
    server.once("POST", START, 200, r#"{"success":false}"#);
    server.once("POST", START, 500, r#"{"success":false,"error":"job already exists"}"#);
    let controller = controller(&server);

    let snapshot = controller
        .start(Some(USER_ID), &passing_checks(), None)
        .await
        .expect("start is sent");
    assert_eq!(snapshot.phase, RunPhase::Error);
    assert_eq!(snapshot.last_error.as_deref(), Some("unknown error"));
    assert!(!snapshot.polling);

    let snapshot = controller
        .start(Some(USER_ID), &passing_checks(), None)
        .await
        .expect("error phase can be re-armed");
    assert_eq!(snapshot.last_error.as_deref(), Some("job already exists"));

    advance(POLL * 2).await;
    assert_eq!(server.count("GET", &status_path()), 0);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_transport_failure_on_start() {
    let server = FakeServer::new();
    server.fail_once("POST", START);
    let controller = controller(&server);

    let snapshot = controller
        .start(Some(USER_ID), &passing_checks(), None)
        .await
        .expect("start is sent");

    assert_eq!(snapshot.phase, RunPhase::Error);
    assert!(snapshot.last_error.is_some());
    assert!(snapshot.started_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_active_run_rejects_second_start() {
    let server = FakeServer::new();
    server.always("GET", &status_path(), 200, RUNNING);
    let controller = started(&server).await;

    let result = controller.start(Some(USER_ID), &passing_checks(), None).await;

    assert_eq!(result, Err(StartRejected::AlreadyActive));
    assert_eq!(server.count("POST", START), 1);
    controller.teardown();
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_start_polling_is_idempotent() {
    let server = FakeServer::new();
    server.always("GET", &status_path(), 200, RUNNING);
    let controller = started(&server).await;

    assert!(controller.start_polling());
    assert!(controller.start_polling());
    advance(POLL + Duration::from_millis(1)).await;

    assert_eq!(server.count("GET", &status_path()), 1);
    controller.teardown();
    assert!(!controller.start_polling());
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_late_start_reply_is_discarded() {
    let server = FakeServer::new();
    server.once_delayed("POST", START, 200, OK, Duration::from_millis(1_000));
    server.always("GET", &status_path(), 200, RUNNING);
    let controller = controller(&server);

    let checks = passing_checks();
    let (snapshot, ()) = tokio::join!(
        controller.start(Some(USER_ID), &checks, None),
        async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            controller.teardown();
        }
    );

    let snapshot = snapshot.expect("start was sent");
    assert_eq!(snapshot.phase, RunPhase::Idle);
    assert!(!snapshot.polling);
    advance(POLL * 2).await;
    assert_eq!(server.count("GET", &status_path()), 0);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_late_stop_reply_after_teardown_is_discarded() {
    let server = FakeServer::new();
    server.once_delayed("POST", "/api/rpa/stop", 200, OK, Duration::from_millis(1_000));
    let controller = started(&server).await;

    let (stopped, ()) = tokio::join!(controller.stop_run(USER_ID), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        controller.teardown();
    });

    assert_eq!(stopped, Ok(None));
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, RunPhase::Idle);
    assert_eq!(snapshot.status_text, "");
    assert!(!snapshot.polling);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_in_flight_poll_after_teardown_is_dropped() {
    let server = FakeServer::new();
    server.once_delayed(
        "GET",
        &status_path(),
        200,
        r#"{"success":true,"status":"completed"}"#,
        Duration::from_millis(2_000),
    );
    let controller = started(&server).await;

    advance(POLL + Duration::from_millis(1_000)).await;
    assert_eq!(server.count("GET", &status_path()), 1);
    controller.teardown();
    advance(Duration::from_millis(2_000)).await;

    assert_eq!(controller.phase(), RunPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_stop_polling_marks_stopped() {
    let server = FakeServer::new();
    server.always("GET", &status_path(), 200, RUNNING);
    let controller = started(&server).await;

    controller.stop_polling();
    controller.stop_polling();
    advance(POLL * 2).await;

    assert_eq!(controller.phase(), RunPhase::Stopped);
    assert!(!controller.is_polling());
    assert_eq!(server.count("GET", &status_path()), 0);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_stop_run_clears_start_time() {
    let server = FakeServer::new();
    server.always("GET", &status_path(), 200, RUNNING);
    server.once("POST", "/api/rpa/stop", 200, r#"{"success":false,"error":"not yours"}"#);
    server.once("POST", "/api/rpa/stop", 200, OK);
    let controller = started(&server).await;

    let refused = controller.stop_run(USER_ID).await;
    assert_eq!(refused, Err(RunRequestError::Server("not yours".to_string())));
    assert_eq!(controller.phase(), RunPhase::Running);

    let elapsed = controller.stop_run(USER_ID).await.expect("stop should succeed");
    assert!(elapsed.is_some());
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, RunPhase::Stopped);
    assert!(snapshot.started_at.is_none());
    assert!(!snapshot.polling);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_stale_cutover_marks_error() {
    let server = FakeServer::new();
    server.always("POST", START, 200, OK);
    let controller = RunController::new(
        RpaClient::new(server.clone()),
        RunControllerConfig {
            poll_interval: POLL,
            stale_after_polls: Some(2),
        },
    );
    controller
        .start(Some(USER_ID), &passing_checks(), None)
        .await
        .expect("start should be accepted");

    advance(POLL + Duration::from_millis(1)).await;
    assert_eq!(controller.phase(), RunPhase::Running);
    advance(POLL).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, RunPhase::Error);
    assert!(!snapshot.polling);
}

#[tokio::test(start_paused = true)]
async fn run_controller_tests_logs_keep_server_order() {
    let server = FakeServer::new();
    server.once(
        "GET",
        &format!("/api/rpa/logs/{USER_ID}"),
        200,
        r#"{"success":true,"totalLogs":3,"logs":[
            {"timestamp":"t3","type":"stdout","message":"c"},
            {"timestamp":"t1","type":"stderr","message":"a"}
        ]}"#,
    );
    let controller = controller(&server);

    let page = controller.fetch_logs(USER_ID, 200).await.expect("logs should load");

    assert_eq!(page.total_logs, 3);
    let messages: Vec<&str> = page.logs.iter().map(|entry| entry.message.as_str()).collect();
    assert_eq!(messages, vec!["c", "a"]);
    assert!(server.requests()[0].path.ends_with("?limit=200"));
}
