//! Validates fixtures and encoded payloads against frozen JSON schemas.

use jsonschema::JSONSchema;
use rpa_console_contract::{LogsResponse, StartRequest, StatusResponse, parse_body};
use rpa_console_core::{RunMode, UserConfig};
use serde_json::Value;

fn load_json(path: &str) -> Value {
    let raw = std::fs::read_to_string(path).expect("json file should be readable");
    serde_json::from_str(&raw).expect("json file should be valid")
}

fn compile_validator(schema_path: &str) -> JSONSchema {
    let schema = load_json(schema_path);
    JSONSchema::compile(&schema).expect("schema should compile")
}

macro_rules! contract {
    ($name:literal) => {
        concat!(env!("CARGO_MANIFEST_DIR"), "/../../contracts/", $name)
    };
}

#[test]
fn user_config_fixture_matches_schema_and_decodes() {
    let validator = compile_validator(contract!("user-config.schema.json"));
    let fixture = load_json(contract!("fixtures/user-config.valid.json"));
    assert!(validator.is_valid(&fixture), "user config fixture should validate");

    let record: UserConfig =
        serde_json::from_value(fixture).expect("fixture should decode into the record type");
    assert_eq!(record.sms_config.provider, "twilio");
}

#[test]
fn default_record_encodes_to_schema() {
    let validator = compile_validator(contract!("user-config.schema.json"));
    let record = UserConfig::new_default("uid-7", "", chrono::Utc::now());
    let encoded = serde_json::to_value(&record).expect("record should encode");
    assert!(validator.is_valid(&encoded), "default record should validate");
}

#[test]
fn start_requests_encode_to_schema() {
    let validator = compile_validator(contract!("start-request.schema.json"));
    let continuous = RunMode::continuous(3_600).expect("upper bound is valid");
    for mode in [None, Some(RunMode::Single), Some(continuous)] {
        let request = StartRequest {
            user_uid: "uid-1".to_string(),
            mode: mode.map(|mode| mode.wire_code().to_string()),
            interval: mode.map(RunMode::interval_secs),
        };
        let encoded = serde_json::to_value(&request).expect("request should encode");
        assert!(validator.is_valid(&encoded), "start request {encoded} should validate");
    }
}

#[test]
fn status_fixture_matches_schema_and_decodes() {
    let validator = compile_validator(contract!("status-response.schema.json"));
    let fixture = load_json(contract!("fixtures/status-response.valid.json"));
    assert!(validator.is_valid(&fixture), "status fixture should validate");

    let parsed: StatusResponse = parse_body(&fixture.to_string()).expect("fixture should decode");
    assert_eq!(parsed.log_count, Some(12));
}

#[test]
fn logs_fixture_matches_schema_and_decodes() {
    let validator = compile_validator(contract!("logs-response.schema.json"));
    let fixture = load_json(contract!("fixtures/logs-response.valid.json"));
    assert!(validator.is_valid(&fixture), "logs fixture should validate");

    let parsed: LogsResponse = parse_body(&fixture.to_string()).expect("fixture should decode");
    let encoded = serde_json::to_value(&parsed).expect("logs should re-encode");
    assert!(validator.is_valid(&encoded), "re-encoded logs should validate");
}
