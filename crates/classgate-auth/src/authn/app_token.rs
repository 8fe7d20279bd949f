use chrono::Utc;
use classgate_types::prelude::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{self, AuthError};

pub const DEFAULT_APP_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct AppClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and checks the HS256 application token that carries a user
/// identity where cookies do not reach.
#[derive(Clone)]
pub struct AppTokenService {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl AppTokenService {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, AuthError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(errors::config_missing("tokens.app_secret"));
        }
        Ok(Self {
            secret: secret.to_vec(),
            ttl_secs: DEFAULT_APP_TOKEN_TTL_SECS,
        })
    }

    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn issue(&self, user: &UserId) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now().timestamp())
    }

    pub fn issue_at(&self, user: &UserId, now: i64) -> Result<String, AuthError> {
        let claims = AppClaims {
            sub: user.as_str().to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|err| errors::internal(&format!("app token signing failed: {err}")))
    }

    /// Expired, forged or malformed tokens all yield `None`.
    pub fn verify(&self, token: &str) -> Option<UserId> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;
        jsonwebtoken::decode::<AppClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .ok()
        .map(|data| data.claims.sub)
        .filter(|sub| !sub.is_empty())
        .map(UserId)
    }
}
