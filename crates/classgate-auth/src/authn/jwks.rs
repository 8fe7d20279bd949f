use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::errors::{self, AuthError};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kty: String,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub k: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Clone, Debug)]
pub enum KeySource {
    Static(Vec<Jwk>),
    Http { uri: String, cache_ttl: Duration },
}

#[derive(Clone)]
struct CachedKeys {
    keys: Vec<Jwk>,
    expires_at: Option<Instant>,
}

impl CachedKeys {
    fn find(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|k| k.kid.as_deref() == Some(kid)),
            None if self.keys.len() == 1 => self.keys.first(),
            None => None,
        }
    }
}

/// Platform key set, fetched on demand and cached for `cache_ttl`.
///
/// A `kid` that is absent from a cached set forces one refetch before the
/// token is declared unverifiable, so platform key rotation does not wait
/// for the cache to age out.
pub struct RemoteKeySet {
    source: KeySource,
    algorithms: Vec<Algorithm>,
    client: Option<reqwest::Client>,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl RemoteKeySet {
    pub fn new(source: KeySource) -> Result<Self, AuthError> {
        Self::with_timeout(source, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(source: KeySource, timeout: Duration) -> Result<Self, AuthError> {
        let client = match &source {
            KeySource::Http { .. } => Some(
                reqwest::Client::builder()
                    .use_rustls_tls()
                    .timeout(timeout)
                    .build()
                    .map_err(|err| {
                        errors::provider_unavailable(&format!("failed to build http client: {err}"))
                    })?,
            ),
            KeySource::Static(_) => None,
        };
        Ok(Self {
            source,
            algorithms: vec![Algorithm::RS256],
            client,
            cache: Arc::new(RwLock::new(None)),
        })
    }

    pub fn http(uri: impl Into<String>, cache_ttl: Duration) -> Result<Self, AuthError> {
        Self::new(KeySource::Http {
            uri: uri.into(),
            cache_ttl,
        })
    }

    fn is_stale(&self) -> bool {
        let guard = self.cache.read();
        match guard.as_ref() {
            Some(cache) => cache.expires_at.map(|at| at <= Instant::now()).unwrap_or(false),
            None => true,
        }
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        let cache = match &self.source {
            KeySource::Static(keys) => CachedKeys {
                keys: keys.clone(),
                expires_at: None,
            },
            KeySource::Http { uri, cache_ttl } => {
                let client = self
                    .client
                    .as_ref()
                    .ok_or_else(|| errors::provider_unavailable("http client not initialised"))?;
                let response = client.get(uri).send().await.map_err(|err| {
                    errors::provider_unavailable(&format!("jwks fetch error: {err}"))
                })?;
                if response.status() != StatusCode::OK {
                    return Err(errors::provider_unavailable(&format!(
                        "jwks fetch status: {}",
                        response.status()
                    )));
                }
                let body: JwkSet = response.json().await.map_err(|err| {
                    errors::provider_unavailable(&format!("jwks decode error: {err}"))
                })?;
                tracing::debug!(
                    target = "classgate::auth::jwks",
                    keys = body.keys.len(),
                    "platform key set refreshed"
                );
                CachedKeys {
                    keys: body.keys,
                    expires_at: Some(Instant::now() + *cache_ttl),
                }
            }
        };
        *self.cache.write() = Some(cache);
        Ok(())
    }

    fn lookup(&self, kid: Option<&str>) -> Option<Jwk> {
        self.cache.read().as_ref().and_then(|c| c.find(kid).cloned())
    }

    /// Resolves the verification key for a token header. `Ok(None)` means
    /// no usable key exists; fetch failures are upstream errors.
    pub async fn resolve(
        &self,
        kid: Option<&str>,
    ) -> Result<Option<(DecodingKey, Algorithm)>, AuthError> {
        let mut refreshed = false;
        if self.is_stale() {
            self.refresh().await?;
            refreshed = true;
        }
        let jwk = match self.lookup(kid) {
            Some(jwk) => Some(jwk),
            None if !refreshed && matches!(self.source, KeySource::Http { .. }) => {
                tracing::info!(
                    target = "classgate::auth::jwks",
                    kid = kid.unwrap_or("-"),
                    "unknown kid, refetching key set"
                );
                self.refresh().await?;
                self.lookup(kid)
            }
            None => None,
        };
        let Some(jwk) = jwk else {
            return Ok(None);
        };
        let Some(alg) = self.select_algorithm(jwk.alg.as_deref()) else {
            return Ok(None);
        };
        match decoding_key(&jwk) {
            Ok(key) => Ok(Some((key, alg))),
            Err(reason) => {
                tracing::warn!(target = "classgate::auth::jwks", "unusable jwk: {reason}");
                Ok(None)
            }
        }
    }

    fn select_algorithm(&self, alg: Option<&str>) -> Option<Algorithm> {
        match alg {
            Some(alg) => Algorithm::from_str(alg)
                .ok()
                .filter(|parsed| self.algorithms.contains(parsed)),
            None => self.algorithms.first().copied(),
        }
    }
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, String> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_ref().ok_or("rsa modulus missing")?;
            let e = jwk.e.as_ref().ok_or("rsa exponent missing")?;
            DecodingKey::from_rsa_components(n, e).map_err(|err| err.to_string())
        }
        "oct" => {
            let secret = jwk.k.as_ref().ok_or("secret missing")?;
            let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(secret.trim_end_matches('='))
                .map_err(|err| format!("secret decode error: {err}"))?;
            Ok(DecodingKey::from_secret(&bytes))
        }
        other => Err(format!("unsupported key type: {other}")),
    }
}
