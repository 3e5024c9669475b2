use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use soundchain_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run(options: LoadOptions) -> String {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = explicit_path.or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["SOUNDCHAIN_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["SOUNDCHAIN_SERVER_PORT"]),
    ));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        source("server.graceful_shutdown_secs", &["SOUNDCHAIN_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ));

    lines.push(render_line(
        "fast_llm.api_key",
        redact_key(config.fast_llm.api_key.as_ref()),
        source("fast_llm.api_key", &["SOUNDCHAIN_FAST_LLM_API_KEY", "GROQ_API_KEY"]),
    ));
    lines.push(render_line(
        "fast_llm.base_url",
        &config.fast_llm.base_url,
        source("fast_llm.base_url", &["SOUNDCHAIN_FAST_LLM_BASE_URL"]),
    ));
    lines.push(render_line(
        "fast_llm.model",
        &config.fast_llm.model,
        source("fast_llm.model", &["SOUNDCHAIN_FAST_LLM_MODEL"]),
    ));

    lines.push(render_line(
        "fallback_llm.api_key",
        redact_key(config.fallback_llm.api_key.as_ref()),
        source("fallback_llm.api_key", &["SOUNDCHAIN_FALLBACK_LLM_API_KEY", "ANTHROPIC_API_KEY"]),
    ));
    lines.push(render_line(
        "fallback_llm.model",
        &config.fallback_llm.model,
        source("fallback_llm.model", &["SOUNDCHAIN_FALLBACK_LLM_MODEL"]),
    ));
    lines.push(render_line(
        "fallback_llm.max_tokens",
        &config.fallback_llm.max_tokens.to_string(),
        source("fallback_llm.max_tokens", &["SOUNDCHAIN_FALLBACK_LLM_MAX_TOKENS"]),
    ));

    lines.push(render_line(
        "agent_memory.api_key",
        redact_key(config.agent_memory.api_key.as_ref()),
        source("agent_memory.api_key", &["SOUNDCHAIN_AGENT_MEMORY_API_KEY", "LETTA_API_KEY"]),
    ));
    lines.push(render_line(
        "agent_memory.base_url",
        &config.agent_memory.base_url,
        source("agent_memory.base_url", &["SOUNDCHAIN_AGENT_MEMORY_BASE_URL", "LETTA_BASE_URL"]),
    ));
    lines.push(render_line(
        "agent_memory.model",
        &config.agent_memory.model,
        source("agent_memory.model", &["SOUNDCHAIN_AGENT_MEMORY_MODEL"]),
    ));

    lines.push(render_line(
        "negotiation.temperature",
        &config.negotiation.temperature.to_string(),
        source("negotiation.temperature", &["SOUNDCHAIN_NEGOTIATION_TEMPERATURE"]),
    ));
    lines.push(render_line(
        "negotiation.enforce_price_floor",
        &config.negotiation.enforce_price_floor.to_string(),
        source("negotiation.enforce_price_floor", &["SOUNDCHAIN_NEGOTIATION_ENFORCE_PRICE_FLOOR"]),
    ));
    let default_rights: Vec<&str> =
        config.negotiation.default_allowed_rights.iter().map(|right| right.as_str()).collect();
    lines.push(render_line(
        "negotiation.default_allowed_rights",
        &default_rights.join(","),
        source(
            "negotiation.default_allowed_rights",
            &["SOUNDCHAIN_NEGOTIATION_DEFAULT_ALLOWED_RIGHTS"],
        ),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["SOUNDCHAIN_LOGGING_LEVEL", "SOUNDCHAIN_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["SOUNDCHAIN_LOGGING_FORMAT", "SOUNDCHAIN_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("soundchain.toml"), PathBuf::from("config/soundchain.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: Option<&SecretString>) -> &'static str {
    if key.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}
