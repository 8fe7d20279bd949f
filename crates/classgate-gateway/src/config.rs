use std::{env, fs, path::Path};

use anyhow::{anyhow, Context};
use classgate_auth::quota::{
    DEFAULT_BYTES_PER_SECOND, DEFAULT_MESSAGE_LIMIT, DEFAULT_SPEAKING_LIMIT_SECS,
};
use config::Config;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_ENV: &str = "CLASSGATE_CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config/classgate.local.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub lti: LtiConfig,
    #[serde(default)]
    pub tool_key: ToolKeyConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl GatewayConfig {
    /// TOML file (optional) overlaid by `CLASSGATE__SECTION__KEY` variables.
    pub fn load() -> anyhow::Result<Self> {
        let config_file =
            env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = Config::builder()
            .set_default("server.address", ServerConfig::default_address())?
            .set_default("server.port", ServerConfig::default_port())?;

        if Path::new(&config_file).exists() {
            builder = builder.add_source(config::File::from(Path::new(&config_file)));
        }

        builder =
            builder.add_source(config::Environment::with_prefix("CLASSGATE").separator("__"));

        let config: GatewayConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        Ok(config)
    }
}

/// Resolves a secret from, in order, a named environment variable, a file,
/// or the literal value.
pub fn resolve_secret_source(
    literal: &Option<String>,
    env_key: &Option<String>,
    file_path: &Option<String>,
    field: &str,
) -> anyhow::Result<String> {
    if let Some(env_var) = env_key.as_ref() {
        let value = env::var(env_var)
            .with_context(|| format!("environment variable {env_var} for {field} not set"))?;
        if value.trim().is_empty() {
            return Err(anyhow!("environment variable {env_var} for {field} is empty"));
        }
        return Ok(value);
    }
    if let Some(path) = file_path.as_ref() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read secret file {path} for {field}"))?;
        let value = contents.trim();
        if value.is_empty() {
            return Err(anyhow!("secret file {path} for {field} is empty"));
        }
        return Ok(value.to_string());
    }
    if let Some(value) = literal.as_ref() {
        if value.trim().is_empty() {
            return Err(anyhow!("{field} literal secret cannot be empty"));
        }
        return Ok(value.clone());
    }
    Err(anyhow!("{field} must be provided via literal/env/file"))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_address")]
    pub address: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_address() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LtiConfig {
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Platform key set used to verify launch tokens.
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default = "LtiConfig::default_jwks_cache_secs")]
    pub jwks_cache_secs: u64,
    #[serde(default = "LtiConfig::default_app_root")]
    pub app_root: String,
    #[serde(default = "LtiConfig::default_content_title")]
    pub content_title: String,
}

impl LtiConfig {
    fn default_jwks_cache_secs() -> u64 {
        300
    }

    fn default_app_root() -> String {
        "/".to_string()
    }

    fn default_content_title() -> String {
        "English Tutor".to_string()
    }
}

impl Default for LtiConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            client_id: None,
            authorization_endpoint: None,
            redirect_uri: None,
            jwks_url: None,
            jwks_cache_secs: Self::default_jwks_cache_secs(),
            app_root: Self::default_app_root(),
            content_title: Self::default_content_title(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolKeyConfig {
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub private_key_env: Option<String>,
    #[serde(default)]
    pub private_key_file: Option<String>,
    #[serde(default)]
    pub public_jwks: Option<String>,
    #[serde(default)]
    pub public_jwks_env: Option<String>,
    #[serde(default)]
    pub public_jwks_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    #[serde(default)]
    pub app_secret: Option<String>,
    #[serde(default)]
    pub app_secret_env: Option<String>,
    #[serde(default)]
    pub app_secret_file: Option<String>,
    #[serde(default = "TokenConfig::default_ttl_secs")]
    pub ttl_secs: i64,
}

impl TokenConfig {
    fn default_ttl_secs() -> i64 {
        classgate_auth::authn::app_token::DEFAULT_APP_TOKEN_TTL_SECS
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            app_secret: None,
            app_secret_env: None,
            app_secret_file: None,
            ttl_secs: Self::default_ttl_secs(),
        }
    }
}

/// A purchasable top-up offered when the message quota runs out.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpgradePackage {
    pub label: String,
    pub url: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    #[serde(default = "QuotaConfig::default_message_limit")]
    pub message_limit: i64,
    #[serde(default = "QuotaConfig::default_speaking_limit_seconds")]
    pub speaking_limit_seconds: i64,
    #[serde(default = "QuotaConfig::default_message_prefix")]
    pub message_prefix: String,
    #[serde(default = "QuotaConfig::default_speaking_prefix")]
    pub speaking_prefix: String,
    /// Audio size assumed per second when a client reports no duration.
    #[serde(default = "QuotaConfig::default_bytes_per_second")]
    pub bytes_per_second: u64,
    #[serde(default)]
    pub packages: Vec<UpgradePackage>,
}

impl QuotaConfig {
    fn default_message_limit() -> i64 {
        DEFAULT_MESSAGE_LIMIT
    }

    fn default_speaking_limit_seconds() -> i64 {
        DEFAULT_SPEAKING_LIMIT_SECS
    }

    fn default_message_prefix() -> String {
        "quota".to_string()
    }

    fn default_speaking_prefix() -> String {
        "speaking".to_string()
    }

    fn default_bytes_per_second() -> u64 {
        DEFAULT_BYTES_PER_SECOND
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            message_limit: Self::default_message_limit(),
            speaking_limit_seconds: Self::default_speaking_limit_seconds(),
            message_prefix: Self::default_message_prefix(),
            speaking_prefix: Self::default_speaking_prefix(),
            bytes_per_second: Self::default_bytes_per_second(),
            packages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_prefix")]
    pub prefix: String,
    #[serde(default = "HistoryConfig::default_max_entries")]
    pub max_entries: usize,
}

impl HistoryConfig {
    fn default_prefix() -> String {
        classgate_history::log::DEFAULT_PREFIX.to_string()
    }

    fn default_max_entries() -> usize {
        classgate_history::log::DEFAULT_MAX_ENTRIES
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
            max_entries: Self::default_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Memory,
    Rest,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default = "StoreConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl StoreConfig {
    fn default_timeout_ms() -> u64 {
        5_000
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            url: None,
            token: None,
            token_env: None,
            token_file: None,
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub secret_env: Option<String>,
    #[serde(default)]
    pub secret_file: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum LlmProvider {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "local")]
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub chat_model: Option<String>,
    #[serde(default)]
    pub transcribe_model: Option<String>,
    #[serde(default)]
    pub speech_model: Option<String>,
    #[serde(default = "LlmConfig::default_voice")]
    pub voice: String,
    #[serde(default = "LlmConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Language the pronunciation feedback is written in.
    #[serde(default = "LlmConfig::default_feedback_language")]
    pub feedback_language: String,
}

impl LlmConfig {
    fn default_voice() -> String {
        "alloy".to_string()
    }

    fn default_timeout_secs() -> u64 {
        30
    }

    fn default_feedback_language() -> String {
        "Portuguese".to_string()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            api_key: None,
            api_key_env: None,
            api_key_file: None,
            base_url: None,
            chat_model: None,
            transcribe_model: None,
            speech_model: None,
            voice: Self::default_voice(),
            timeout_secs: Self::default_timeout_secs(),
            feedback_language: Self::default_feedback_language(),
        }
    }
}
