use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::terms::UsageRight;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub fast_llm: FastLlmConfig,
    pub fallback_llm: FallbackLlmConfig,
    pub agent_memory: AgentMemoryConfig,
    pub negotiation: NegotiationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// OpenAI-compatible chat completion service used by the fast path.
#[derive(Clone, Debug)]
pub struct FastLlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Single-shot messages API used when no richer backend is selected.
#[derive(Clone, Debug)]
pub struct FallbackLlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct AgentMemoryConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub embedding: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NegotiationConfig {
    pub temperature: f32,
    pub enforce_price_floor: bool,
    pub default_allowed_rights: Vec<UsageRight>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub fast_llm_api_key: Option<String>,
    pub fallback_llm_api_key: Option<String>,
    pub agent_memory_api_key: Option<String>,
    pub enforce_price_floor: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_ALLOWED_RIGHTS: [&str; 4] = ["STREAMING", "YOUTUBE", "PODCAST", "COMMERCIAL"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            fast_llm: FastLlmConfig {
                api_key: None,
                base_url: "https://api.groq.com/openai/v1".to_string(),
                model: "llama-3.1-70b-versatile".to_string(),
                timeout_secs: 30,
            },
            fallback_llm: FallbackLlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com/v1".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                timeout_secs: 60,
                max_tokens: 1024,
            },
            agent_memory: AgentMemoryConfig {
                api_key: None,
                base_url: "https://api.letta.com".to_string(),
                model: "claude-3-5-sonnet-20241022".to_string(),
                embedding: "google/text-embedding-004".to_string(),
                timeout_secs: 60,
            },
            negotiation: NegotiationConfig {
                temperature: 0.7,
                enforce_price_floor: false,
                default_allowed_rights: DEFAULT_ALLOWED_RIGHTS
                    .iter()
                    .map(UsageRight::new)
                    .collect(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

fn has_key(api_key: &Option<SecretString>) -> bool {
    api_key.as_ref().is_some_and(|value| !value.expose_secret().trim().is_empty())
}

impl FastLlmConfig {
    pub fn is_configured(&self) -> bool {
        has_key(&self.api_key)
    }
}

impl FallbackLlmConfig {
    pub fn is_configured(&self) -> bool {
        has_key(&self.api_key)
    }
}

impl AgentMemoryConfig {
    pub fn is_configured(&self) -> bool {
        has_key(&self.api_key)
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("soundchain.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(fast_llm) = patch.fast_llm {
            if let Some(api_key) = fast_llm.api_key {
                self.fast_llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = fast_llm.base_url {
                self.fast_llm.base_url = base_url;
            }
            if let Some(model) = fast_llm.model {
                self.fast_llm.model = model;
            }
            if let Some(timeout_secs) = fast_llm.timeout_secs {
                self.fast_llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(fallback_llm) = patch.fallback_llm {
            if let Some(api_key) = fallback_llm.api_key {
                self.fallback_llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = fallback_llm.base_url {
                self.fallback_llm.base_url = base_url;
            }
            if let Some(model) = fallback_llm.model {
                self.fallback_llm.model = model;
            }
            if let Some(timeout_secs) = fallback_llm.timeout_secs {
                self.fallback_llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tokens) = fallback_llm.max_tokens {
                self.fallback_llm.max_tokens = max_tokens;
            }
        }

        if let Some(agent_memory) = patch.agent_memory {
            if let Some(api_key) = agent_memory.api_key {
                self.agent_memory.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = agent_memory.base_url {
                self.agent_memory.base_url = base_url;
            }
            if let Some(model) = agent_memory.model {
                self.agent_memory.model = model;
            }
            if let Some(embedding) = agent_memory.embedding {
                self.agent_memory.embedding = embedding;
            }
            if let Some(timeout_secs) = agent_memory.timeout_secs {
                self.agent_memory.timeout_secs = timeout_secs;
            }
        }

        if let Some(negotiation) = patch.negotiation {
            if let Some(temperature) = negotiation.temperature {
                self.negotiation.temperature = temperature;
            }
            if let Some(enforce_price_floor) = negotiation.enforce_price_floor {
                self.negotiation.enforce_price_floor = enforce_price_floor;
            }
            if let Some(rights) = negotiation.default_allowed_rights {
                self.negotiation.default_allowed_rights =
                    rights.iter().map(UsageRight::new).collect();
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SOUNDCHAIN_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SOUNDCHAIN_SERVER_PORT") {
            self.server.port = parse_u16("SOUNDCHAIN_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SOUNDCHAIN_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SOUNDCHAIN_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let fast_key = read_env("SOUNDCHAIN_FAST_LLM_API_KEY").or_else(|| read_env("GROQ_API_KEY"));
        if let Some(value) = fast_key {
            self.fast_llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SOUNDCHAIN_FAST_LLM_BASE_URL") {
            self.fast_llm.base_url = value;
        }
        if let Some(value) = read_env("SOUNDCHAIN_FAST_LLM_MODEL") {
            self.fast_llm.model = value;
        }
        if let Some(value) = read_env("SOUNDCHAIN_FAST_LLM_TIMEOUT_SECS") {
            self.fast_llm.timeout_secs = parse_u64("SOUNDCHAIN_FAST_LLM_TIMEOUT_SECS", &value)?;
        }

        let fallback_key =
            read_env("SOUNDCHAIN_FALLBACK_LLM_API_KEY").or_else(|| read_env("ANTHROPIC_API_KEY"));
        if let Some(value) = fallback_key {
            self.fallback_llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SOUNDCHAIN_FALLBACK_LLM_BASE_URL") {
            self.fallback_llm.base_url = value;
        }
        if let Some(value) = read_env("SOUNDCHAIN_FALLBACK_LLM_MODEL") {
            self.fallback_llm.model = value;
        }
        if let Some(value) = read_env("SOUNDCHAIN_FALLBACK_LLM_TIMEOUT_SECS") {
            self.fallback_llm.timeout_secs =
                parse_u64("SOUNDCHAIN_FALLBACK_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SOUNDCHAIN_FALLBACK_LLM_MAX_TOKENS") {
            self.fallback_llm.max_tokens = parse_u32("SOUNDCHAIN_FALLBACK_LLM_MAX_TOKENS", &value)?;
        }

        let agent_key =
            read_env("SOUNDCHAIN_AGENT_MEMORY_API_KEY").or_else(|| read_env("LETTA_API_KEY"));
        if let Some(value) = agent_key {
            self.agent_memory.api_key = Some(secret_value(value));
        }
        let agent_url =
            read_env("SOUNDCHAIN_AGENT_MEMORY_BASE_URL").or_else(|| read_env("LETTA_BASE_URL"));
        if let Some(value) = agent_url {
            self.agent_memory.base_url = value;
        }
        if let Some(value) = read_env("SOUNDCHAIN_AGENT_MEMORY_MODEL") {
            self.agent_memory.model = value;
        }
        if let Some(value) = read_env("SOUNDCHAIN_AGENT_MEMORY_EMBEDDING") {
            self.agent_memory.embedding = value;
        }
        if let Some(value) = read_env("SOUNDCHAIN_AGENT_MEMORY_TIMEOUT_SECS") {
            self.agent_memory.timeout_secs =
                parse_u64("SOUNDCHAIN_AGENT_MEMORY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SOUNDCHAIN_NEGOTIATION_TEMPERATURE") {
            self.negotiation.temperature = parse_f32("SOUNDCHAIN_NEGOTIATION_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("SOUNDCHAIN_NEGOTIATION_ENFORCE_PRICE_FLOOR") {
            self.negotiation.enforce_price_floor =
                parse_bool("SOUNDCHAIN_NEGOTIATION_ENFORCE_PRICE_FLOOR", &value)?;
        }
        if let Some(value) = read_env("SOUNDCHAIN_NEGOTIATION_DEFAULT_ALLOWED_RIGHTS") {
            self.negotiation.default_allowed_rights = value
                .split(',')
                .map(UsageRight::new)
                .filter(|right| !right.as_str().is_empty())
                .collect();
        }

        let log_level =
            read_env("SOUNDCHAIN_LOGGING_LEVEL").or_else(|| read_env("SOUNDCHAIN_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SOUNDCHAIN_LOGGING_FORMAT").or_else(|| read_env("SOUNDCHAIN_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(api_key) = overrides.fast_llm_api_key {
            self.fast_llm.api_key = Some(secret_value(api_key));
        }
        if let Some(api_key) = overrides.fallback_llm_api_key {
            self.fallback_llm.api_key = Some(secret_value(api_key));
        }
        if let Some(api_key) = overrides.agent_memory_api_key {
            self.agent_memory.api_key = Some(secret_value(api_key));
        }
        if let Some(enforce_price_floor) = overrides.enforce_price_floor {
            self.negotiation.enforce_price_floor = enforce_price_floor;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_endpoint("fast_llm", &self.fast_llm.base_url, self.fast_llm.timeout_secs)?;
        validate_endpoint(
            "fallback_llm",
            &self.fallback_llm.base_url,
            self.fallback_llm.timeout_secs,
        )?;
        if self.fallback_llm.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "fallback_llm.max_tokens must be greater than zero".to_string(),
            ));
        }
        validate_endpoint(
            "agent_memory",
            &self.agent_memory.base_url,
            self.agent_memory.timeout_secs,
        )?;
        validate_negotiation(&self.negotiation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    /// Names of the text-generation backends that have credentials.
    pub fn configured_backends(&self) -> Vec<&'static str> {
        let mut backends = Vec::new();
        if self.fast_llm.is_configured() {
            backends.push("fast_llm");
        }
        if self.agent_memory.is_configured() {
            backends.push("agent_memory");
        }
        if self.fallback_llm.is_configured() {
            backends.push("fallback_llm");
        }
        backends
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("soundchain.toml"), PathBuf::from("config/soundchain.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoint(section: &str, base_url: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{section}.base_url must start with http:// or https://"
        )));
    }

    if timeout_secs == 0 || timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "{section}.timeout_secs must be in range 1..=300"
        )));
    }

    Ok(())
}

fn validate_negotiation(negotiation: &NegotiationConfig) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&negotiation.temperature) {
        return Err(ConfigError::Validation(
            "negotiation.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if negotiation.default_allowed_rights.is_empty() {
        return Err(ConfigError::Validation(
            "negotiation.default_allowed_rights must list at least one right".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    fast_llm: Option<FastLlmPatch>,
    fallback_llm: Option<FallbackLlmPatch>,
    agent_memory: Option<AgentMemoryPatch>,
    negotiation: Option<NegotiationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FastLlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FallbackLlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentMemoryPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    embedding: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NegotiationPatch {
    temperature: Option<f32>,
    enforce_price_floor: Option<bool>,
    default_allowed_rights: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
