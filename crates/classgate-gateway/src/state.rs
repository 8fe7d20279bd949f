use std::env;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use classgate_auth::prelude::*;
use classgate_history::HistoryLog;
use classgate_kv::prelude::*;
use classgate_llm::prelude::*;

use crate::config::{
    resolve_secret_source, GatewayConfig, LlmConfig, LlmProvider, LtiConfig, StoreConfig,
    StoreKind, ToolKeyConfig, UpgradePackage,
};
use crate::errors::ApiError;
use crate::metrics::GatewayMetrics;

/// A dependency that may be absent from configuration. Startup never fails
/// on a missing value; the first request needing it gets `CONFIG.MISSING`.
#[derive(Clone)]
pub enum Provisioned<T> {
    Ready(T),
    Missing(Arc<str>),
}

impl<T> Provisioned<T> {
    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Provisioned::Ready(value),
            Err(err) => Provisioned::Missing(err.to_string().into()),
        }
    }

    pub fn missing(what: impl Into<Arc<str>>) -> Self {
        Provisioned::Missing(what.into())
    }

    pub fn get(&self) -> Result<&T, ApiError> {
        match self {
            Provisioned::Ready(value) => Ok(value),
            Provisioned::Missing(what) => Err(classgate_auth::errors::config_missing(what).into()),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Provisioned::Ready(value) => Some(value),
            Provisioned::Missing(_) => None,
        }
    }

    pub fn map<U>(&self, f: impl FnOnce(&T) -> U) -> Provisioned<U> {
        match self {
            Provisioned::Ready(value) => Provisioned::Ready(f(value)),
            Provisioned::Missing(what) => Provisioned::Missing(what.clone()),
        }
    }

    fn log_if_missing(&self, component: &str) {
        if let Provisioned::Missing(what) = self {
            tracing::warn!(
                target = "classgate::gateway",
                component,
                "not configured, requests needing it will fail: {what}"
            );
        }
    }
}

#[derive(Clone)]
pub struct VersionInfo {
    pub version: String,
    pub commit: Option<String>,
}

impl VersionInfo {
    pub fn from_env() -> Self {
        Self {
            version: env::var("CLASSGATE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            commit: env::var("GIT_COMMIT_HASH").ok(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub handshake: Provisioned<Arc<LtiHandshake>>,
    pub tool_keys: Provisioned<Arc<ToolKeySet>>,
    pub identity: IdentityResolver,
    pub quota: Provisioned<QuotaLedger>,
    pub history: Provisioned<HistoryLog>,
    pub tutor: Provisioned<SharedTutor>,
    pub admin_secret: Provisioned<Arc<str>>,
    pub packages: Arc<Vec<UpgradePackage>>,
    pub bytes_per_second: u64,
    pub feedback_language: Arc<str>,
    pub version: VersionInfo,
    pub metrics: GatewayMetrics,
    config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn from_config(config: GatewayConfig) -> Self {
        let tokens = Provisioned::from_result(build_tokens(&config));
        let store = Provisioned::from_result(build_store(&config.store));
        let tutor = Provisioned::from_result(build_tutor(&config.llm));
        let handshake = Provisioned::from_result(build_handshake(
            &config.lti,
            &config.tool_key,
            tokens.ready(),
        ));
        let tool_keys = Provisioned::from_result(build_tool_keys(&config.tool_key));
        let admin_secret = Provisioned::from_result(
            resolve_secret_source(
                &config.admin.secret,
                &config.admin.secret_env,
                &config.admin.secret_file,
                "admin.secret",
            )
            .map(Arc::<str>::from),
        );

        tokens.log_if_missing("tokens");
        store.log_if_missing("store");
        tutor.log_if_missing("llm");
        handshake.log_if_missing("lti");
        tool_keys.log_if_missing("tool_key.public_jwks");
        admin_secret.log_if_missing("admin");

        let config = Arc::new(config);
        let mut state = Self {
            handshake,
            tool_keys,
            identity: IdentityResolver::new(tokens.ready().cloned()),
            quota: Provisioned::missing("store"),
            history: Provisioned::missing("store"),
            tutor,
            admin_secret,
            packages: Arc::new(config.quota.packages.clone()),
            bytes_per_second: config.quota.bytes_per_second,
            feedback_language: config.llm.feedback_language.as_str().into(),
            version: VersionInfo::from_env(),
            metrics: GatewayMetrics::default(),
            config,
        };
        state.attach_store(store);
        state
    }

    /// Replaces the key-value store behind the quota ledger and history log.
    pub fn with_store(mut self, store: SharedKv) -> Self {
        self.attach_store(Provisioned::Ready(store));
        self
    }

    pub fn with_tutor(mut self, tutor: SharedTutor) -> Self {
        self.tutor = Provisioned::Ready(tutor);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn attach_store(&mut self, store: Provisioned<SharedKv>) {
        let quota = &self.config.quota;
        let history = &self.config.history;
        self.quota = store.map(|kv| {
            QuotaLedger::new(kv.clone())
                .with_policy(
                    QuotaKind::Messages,
                    QuotaPolicy {
                        prefix: quota.message_prefix.clone(),
                        limit: quota.message_limit,
                    },
                )
                .with_policy(
                    QuotaKind::Speaking,
                    QuotaPolicy {
                        prefix: quota.speaking_prefix.clone(),
                        limit: quota.speaking_limit_seconds,
                    },
                )
        });
        self.history = store.map(|kv| {
            HistoryLog::new(kv.clone())
                .with_prefix(history.prefix.clone())
                .with_max_entries(history.max_entries)
        });
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| field.to_string())
}

fn build_tokens(config: &GatewayConfig) -> Result<AppTokenService, String> {
    let secret = resolve_secret_source(
        &config.tokens.app_secret,
        &config.tokens.app_secret_env,
        &config.tokens.app_secret_file,
        "tokens.app_secret",
    )
    .map_err(|err| format!("{err:#}"))?;
    AppTokenService::new(secret)
        .map(|tokens| tokens.with_ttl_secs(config.tokens.ttl_secs))
        .map_err(|err| err.to_string())
}

fn build_store(config: &StoreConfig) -> Result<SharedKv, String> {
    match config.kind {
        StoreKind::Memory => {
            tracing::warn!(
                target = "classgate::gateway",
                "using the in-process store; quotas and history reset on restart"
            );
            Ok(Arc::new(MemoryKv::new()))
        }
        StoreKind::Rest => {
            let url = required(&config.url, "store.url")?;
            let token = resolve_secret_source(
                &config.token,
                &config.token_env,
                &config.token_file,
                "store.token",
            )
            .map_err(|err| format!("{err:#}"))?;
            let rest = RestKv::new(
                RestKvConfig::new(url, token)
                    .with_timeout(Duration::from_millis(config.timeout_ms)),
            )
            .map_err(|err| err.to_string())?;
            Ok(Arc::new(rest))
        }
    }
}

fn build_tutor(config: &LlmConfig) -> Result<SharedTutor, String> {
    match config.provider {
        LlmProvider::Local => Ok(Arc::new(LocalEchoTutor::default())),
        LlmProvider::OpenAi => {
            let api_key = resolve_secret_source(
                &config.api_key,
                &config.api_key_env,
                &config.api_key_file,
                "llm.api_key",
            )
            .map_err(|err| format!("{err:#}"))?;
            let mut openai = OpenAiConfig::new(api_key)
                .map_err(|err| err.to_string())?
                .with_timeout(Duration::from_secs(config.timeout_secs));
            if let Some(base_url) = &config.base_url {
                openai = openai.with_base_url(base_url).map_err(|err| err.to_string())?;
            }
            if let Some(model) = &config.chat_model {
                openai = openai.with_chat_model(model.clone());
            }
            if let Some(model) = &config.transcribe_model {
                openai = openai.with_transcribe_model(model.clone());
            }
            if let Some(model) = &config.speech_model {
                openai = openai.with_speech_model(model.clone(), config.voice.clone());
            }
            let tutor = OpenAiTutor::new(openai).map_err(|err| err.to_string())?;
            Ok(Arc::new(tutor))
        }
    }
}

fn build_handshake(
    lti: &LtiConfig,
    tool_key: &ToolKeyConfig,
    tokens: Option<&AppTokenService>,
) -> Result<Arc<LtiHandshake>, String> {
    let settings = LtiSettings {
        issuer: required(&lti.issuer, "lti.issuer")?.to_string(),
        client_id: required(&lti.client_id, "lti.client_id")?.to_string(),
        authorization_endpoint: required(
            &lti.authorization_endpoint,
            "lti.authorization_endpoint",
        )?
        .to_string(),
        redirect_uri: required(&lti.redirect_uri, "lti.redirect_uri")?.to_string(),
        app_root: lti.app_root.clone(),
        content_title: lti.content_title.clone(),
    };
    let jwks_url = required(&lti.jwks_url, "lti.jwks_url")?;
    let tokens = tokens.cloned().ok_or_else(|| "tokens.app_secret".to_string())?;

    let keys = RemoteKeySet::http(jwks_url, Duration::from_secs(lti.jwks_cache_secs))
        .map_err(|err| err.to_string())?;
    let verifier = Arc::new(PlatformVerifier::new(
        settings.issuer.clone(),
        settings.client_id.clone(),
        keys,
    ));
    let client_id = settings.client_id.clone();
    let mut handshake = LtiHandshake::new(settings, verifier, tokens);

    // Resource launches work without a signing key; deep linking reports
    // the gap when it is attempted.
    match build_signer(&client_id, tool_key) {
        Ok(signer) => handshake = handshake.with_signer(Arc::new(signer)),
        Err(reason) => tracing::warn!(
            target = "classgate::gateway",
            "deep linking disabled: {reason}"
        ),
    }
    Ok(Arc::new(handshake))
}

fn build_signer(client_id: &str, tool_key: &ToolKeyConfig) -> Result<DeepLinkSigner, String> {
    let pem = resolve_secret_source(
        &tool_key.private_key,
        &tool_key.private_key_env,
        &tool_key.private_key_file,
        "tool_key.private_key",
    )
    .map_err(|err| format!("{err:#}"))?;
    let kid = required(&tool_key.kid, "tool_key.kid")?;
    DeepLinkSigner::from_pem(client_id, kid, &pem).map_err(|err| err.to_string())
}

fn build_tool_keys(tool_key: &ToolKeyConfig) -> Result<Arc<ToolKeySet>, String> {
    let raw = resolve_secret_source(
        &tool_key.public_jwks,
        &tool_key.public_jwks_env,
        &tool_key.public_jwks_file,
        "tool_key.public_jwks",
    )
    .map_err(|err| format!("{err:#}"))?;
    ToolKeySet::parse(&raw)
        .map(Arc::new)
        .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use classgate_errors::prelude::codes;

    #[test]
    fn empty_config_starts_with_every_secret_missing() {
        let state = AppState::from_config(GatewayConfig::default());
        assert!(state.quota.ready().is_some());
        assert!(state.history.ready().is_some());
        let err = state.handshake.get().err().expect("lti not configured");
        assert!(err.into_inner().is(codes::CONFIG_MISSING));
        assert!(state.tool_keys.get().is_err());
        assert!(state.admin_secret.get().is_err());
        assert!(state.tutor.get().is_err());
    }

    #[test]
    fn rest_store_without_url_is_missing() {
        let mut config = GatewayConfig::default();
        config.store.kind = StoreKind::Rest;
        let state = AppState::from_config(config);
        let err = state.quota.get().err().expect("store missing");
        let obj = err.into_inner();
        assert!(obj.is(codes::CONFIG_MISSING));
        assert!(obj.message_dev.unwrap_or_default().contains("store.url"));
    }

    #[test]
    fn handshake_is_ready_without_signing_key() {
        let mut config = GatewayConfig::default();
        config.lti = LtiConfig {
            issuer: Some("https://canvas.example".into()),
            client_id: Some("42".into()),
            authorization_endpoint: Some("https://canvas.example/auth".into()),
            redirect_uri: Some("https://tool.example/api/lti/launch".into()),
            jwks_url: Some("https://canvas.example/jwks".into()),
            ..LtiConfig::default()
        };
        config.tokens.app_secret = Some("secret".into());
        config.llm.provider = LlmProvider::Local;
        let state = AppState::from_config(config);
        assert!(state.handshake.ready().is_some());
        assert!(state.tutor.ready().is_some());
    }
}
