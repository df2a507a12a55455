//! Integration tests for configuration record encoding.

use rpa_console_core::{CheckKey, RunMode, UserConfig};

#[test]
fn record_codec_tests_reads_sparse_store_documents() {
    let raw = br#"{
        "user_id": "uid-7",
        "email": "owner@example.com",
        "email_config": { "address": "owner@example.com" },
        "created_at": "2025-01-02T03:04:05Z",
        "updated_at": "2025-01-02T03:04:05Z"
    }"#;

    let record = UserConfig::from_json_bytes(raw).expect("sparse record should decode");
    assert_eq!(record.email_config.address, "owner@example.com");
    assert!(record.email_config.app_password.is_empty());
    assert!(record.sms_config.api_url.is_empty());
}

#[test]
fn record_codec_tests_uses_snake_case_field_names() {
    let record = UserConfig::new_default("uid-7", "owner@example.com", chrono::Utc::now());
    let encoded = String::from_utf8(record.to_json_bytes().expect("record should encode"))
        .expect("json should be utf-8");

    assert!(encoded.contains("\"email_config\""));
    assert!(encoded.contains("\"app_password\""));
    assert!(encoded.contains("\"sms_text_b\""));
}

#[test]
fn record_codec_tests_check_keys_use_camel_case_wire_names() {
    let names: Vec<String> = CheckKey::ALL
        .iter()
        .map(|key| serde_json::to_string(key).expect("key should encode"))
        .collect();
    assert_eq!(names[0], "\"emailFormat\"");
    assert_eq!(names[7], "\"server\"");
}

#[test]
fn record_codec_tests_bounds_continuous_interval() {
    assert!(RunMode::continuous(0).is_err());
    assert!(RunMode::continuous(3_601).is_err());
    let mode = RunMode::continuous(30).expect("interval should be accepted");
    assert_eq!(mode.wire_code(), "2");
    assert_eq!(mode.interval_secs(), 30);
}
