use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use soundchain_cli::commands::{
    config, contract, doctor, load_options, price, rights, split_list,
};

#[test]
fn price_reports_reference_breakdown() {
    let result = price::run(&price::PriceInput {
        base: Decimal::new(100, 0),
        rights: split_list("youtube,commercial"),
        territory: "worldwide".to_string(),
        exclusive: false,
        months: None,
    });
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "price");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["message"], "final price $255");
    assert_eq!(payload["result"]["usageMultiplier"], 1.7);
    assert_eq!(payload["result"]["territoryMultiplier"], 1.5);
    assert_eq!(payload["result"]["finalPrice"], 255.0);
}

#[test]
fn price_applies_duration_discount() {
    let result = price::run(&price::PriceInput {
        base: Decimal::new(100, 0),
        rights: Vec::new(),
        territory: "regional".to_string(),
        exclusive: false,
        months: Some(12),
    });

    let payload = parse_payload(&result.output);
    assert_eq!(payload["result"]["durationDiscount"], 0.7);
    assert_eq!(payload["result"]["finalPrice"], 70.0);
}

#[test]
fn price_rejects_negative_base() {
    let result = price::run(&price::PriceInput {
        base: Decimal::new(-1, 0),
        rights: Vec::new(),
        territory: "worldwide".to_string(),
        exclusive: false,
        months: None,
    });
    assert_eq!(result.exit_code, 2);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "invalid_input");
}

#[test]
fn rights_outside_allowed_set_exit_non_zero() {
    let result =
        rights::run(&split_list("youtube,commercial"), &split_list("YOUTUBE,STREAMING"));
    assert_eq!(result.exit_code, 1);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "rights");
    assert_eq!(payload["error_class"], "rights_not_allowed");
    assert_eq!(payload["result"]["valid"], false);
    assert_eq!(payload["result"]["invalidRights"], serde_json::json!(["COMMERCIAL"]));
}

#[test]
fn rights_within_allowed_set_succeed() {
    let result = rights::run(&split_list("youtube"), &split_list("youtube,streaming"));
    assert_eq!(result.exit_code, 0);
    assert_eq!(parse_payload(&result.output)["result"]["valid"], true);
}

#[test]
fn contract_below_floor_is_drafted_and_flagged() {
    let result = contract::run(&contract::ContractInput {
        price: Decimal::new(40, 0),
        rights: split_list("youtube"),
        territory: None,
        exclusive: false,
        months: Some(24),
        no_attribution: false,
        base: Some(Decimal::new(50, 0)),
        starts_at: Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).single().expect("valid start"),
    });
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["result"]["priceFloorViolation"], true);
    assert_eq!(payload["result"]["contract"]["price"], 40.0);
    assert_eq!(payload["result"]["contract"]["territory"], "worldwide");
    let summary = payload["result"]["contract"]["summary"].as_str().unwrap_or_default();
    assert!(summary.contains("2 year(s)"));
    assert_eq!(payload["result"]["expiresAt"], "2027-01-31T00:00:00Z");
}

#[test]
fn contract_without_floor_skips_validation() {
    let result = contract::run(&contract::ContractInput {
        price: Decimal::new(75, 0),
        rights: split_list("podcast"),
        territory: Some("national".to_string()),
        exclusive: true,
        months: None,
        no_attribution: true,
        base: None,
        starts_at: Utc::now(),
    });

    let payload = parse_payload(&result.output);
    assert_eq!(payload["result"]["priceFloorViolation"], false);
    assert!(payload["result"]["priceValidation"].is_null());
    assert_eq!(payload["result"]["contract"]["attribution"], false);
    let summary = payload["result"]["contract"]["summary"].as_str().unwrap_or_default();
    assert!(summary.contains("Perpetual"));
    assert!(payload["result"]["expiresAt"].is_null());
}

#[test]
fn config_redacts_keys_and_attributes_sources() {
    with_env(&[("GROQ_API_KEY", "gsk-secret-value")], || {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("soundchain.toml");
        fs::write(&path, "[server]\nport = 9090\n\n[negotiation]\nenforce_price_floor = true\n")
            .expect("config file should be written");

        let output = config::run(load_options(Some(path.clone())));

        assert!(output.contains("- fast_llm.api_key = <redacted> (source: env (GROQ_API_KEY))"));
        assert!(!output.contains("gsk-secret-value"));
        assert!(output.contains(&format!(
            "- server.port = 9090 (source: file ({}))",
            path.display()
        )));
        assert!(output.contains("- negotiation.enforce_price_floor = true"));
        assert!(output.contains("- agent_memory.api_key = <unset> (source: default)"));
    });
}

#[test]
fn config_reports_missing_explicit_file() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let output = config::run(load_options(Some(dir.path().join("absent.toml"))));

        assert!(output.starts_with("config validation failed"));
    });
}

#[test]
fn doctor_json_passes_with_a_configured_backend() {
    with_env(&[("SOUNDCHAIN_FALLBACK_LLM_API_KEY", "sk-test")], || {
        let output = doctor::run(load_options(None), true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[1]["name"], "backend_credentials");
        assert_eq!(checks[1]["details"], "configured: fallback_llm");
        assert_eq!(checks[2]["name"], "pricing_engine");
        assert_eq!(checks[2]["status"], "pass");
    });
}

#[test]
fn doctor_fails_without_backend_credentials() {
    with_env(&[], || {
        let output = doctor::run(load_options(None), false);

        assert!(output.starts_with("doctor: one or more readiness checks failed"));
        assert!(output.contains("- [fail] backend_credentials"));
        assert!(output.contains("- [ok] pricing_engine"));
    });
}

#[test]
fn doctor_skips_credentials_when_config_is_invalid() {
    with_env(&[("SOUNDCHAIN_SERVER_PORT", "not-a-port")], || {
        let payload = parse_payload(&doctor::run(load_options(None), true));

        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SOUNDCHAIN_SERVER_BIND_ADDRESS",
        "SOUNDCHAIN_SERVER_PORT",
        "SOUNDCHAIN_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SOUNDCHAIN_FAST_LLM_API_KEY",
        "SOUNDCHAIN_FAST_LLM_BASE_URL",
        "SOUNDCHAIN_FAST_LLM_MODEL",
        "SOUNDCHAIN_FAST_LLM_TIMEOUT_SECS",
        "SOUNDCHAIN_FALLBACK_LLM_API_KEY",
        "SOUNDCHAIN_FALLBACK_LLM_BASE_URL",
        "SOUNDCHAIN_FALLBACK_LLM_MODEL",
        "SOUNDCHAIN_FALLBACK_LLM_TIMEOUT_SECS",
        "SOUNDCHAIN_FALLBACK_LLM_MAX_TOKENS",
        "SOUNDCHAIN_AGENT_MEMORY_API_KEY",
        "SOUNDCHAIN_AGENT_MEMORY_BASE_URL",
        "SOUNDCHAIN_AGENT_MEMORY_MODEL",
        "SOUNDCHAIN_AGENT_MEMORY_EMBEDDING",
        "SOUNDCHAIN_AGENT_MEMORY_TIMEOUT_SECS",
        "SOUNDCHAIN_NEGOTIATION_TEMPERATURE",
        "SOUNDCHAIN_NEGOTIATION_ENFORCE_PRICE_FLOOR",
        "SOUNDCHAIN_NEGOTIATION_DEFAULT_ALLOWED_RIGHTS",
        "SOUNDCHAIN_LOGGING_LEVEL",
        "SOUNDCHAIN_LOGGING_FORMAT",
        "SOUNDCHAIN_LOG_LEVEL",
        "SOUNDCHAIN_LOG_FORMAT",
        "GROQ_API_KEY",
        "ANTHROPIC_API_KEY",
        "LETTA_API_KEY",
        "LETTA_BASE_URL",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
