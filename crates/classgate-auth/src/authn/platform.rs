use async_trait::async_trait;
use jsonwebtoken::Validation;
use serde_json::Value;

use crate::authn::jwks::RemoteKeySet;
use crate::errors::HandshakeError;
use crate::model::PlatformClaims;

#[async_trait]
pub trait PlatformTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<PlatformClaims, HandshakeError>;
}

/// Verifies platform `id_token`s: signature against the platform key set,
/// `iss` bound to the configured platform, `aud` containing our client id.
pub struct PlatformVerifier {
    issuer: String,
    client_id: String,
    keys: RemoteKeySet,
}

impl PlatformVerifier {
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>, keys: RemoteKeySet) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            keys,
        }
    }

    fn build_validation(&self, alg: jsonwebtoken::Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_audience(std::slice::from_ref(&self.client_id));
        validation
    }
}

#[async_trait]
impl PlatformTokenVerifier for PlatformVerifier {
    async fn verify(&self, id_token: &str) -> Result<PlatformClaims, HandshakeError> {
        let header = jsonwebtoken::decode_header(id_token)
            .map_err(|err| HandshakeError::TokenInvalid(format!("header: {err}")))?;
        let (key, alg) = self
            .keys
            .resolve(header.kid.as_deref())
            .await?
            .ok_or_else(|| HandshakeError::TokenInvalid("no matching platform key".into()))?;
        if header.alg != alg {
            return Err(HandshakeError::TokenInvalid(format!(
                "algorithm {:?} not allowed",
                header.alg
            )));
        }
        let data = jsonwebtoken::decode::<Value>(id_token, &key, &self.build_validation(alg))
            .map_err(|err| HandshakeError::TokenInvalid(err.to_string()))?;
        match data.claims {
            Value::Object(map) => Ok(PlatformClaims::from_claims(&map)),
            _ => Err(HandshakeError::TokenInvalid("claims must be an object".into())),
        }
    }
}
