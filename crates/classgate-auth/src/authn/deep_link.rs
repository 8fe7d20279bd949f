use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

use crate::errors::{self, AuthError};
use crate::model::{
    CONTENT_ITEMS_CLAIM, DEEP_LINK_DATA_CLAIM, DEPLOYMENT_ID_CLAIM, MESSAGE_TYPE_CLAIM,
    VERSION_CLAIM,
};

pub const DEEP_LINK_RESPONSE_TTL_SECS: i64 = 300;

/// One `ltiResourceLink` content item returned to the platform.
#[derive(Clone, Debug)]
pub struct ResourceLinkItem {
    pub title: String,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct DeepLinkResponse<'a> {
    pub platform_issuer: &'a str,
    pub deployment_id: Option<&'a str>,
    pub data: Option<&'a Value>,
    pub items: &'a [ResourceLinkItem],
}

/// Signs deep-linking responses with the tool's private RSA key.
pub struct DeepLinkSigner {
    client_id: String,
    kid: String,
    key: EncodingKey,
}

impl DeepLinkSigner {
    /// Accepts PKCS#1 or PKCS#8 PEM.
    pub fn from_pem(
        client_id: impl Into<String>,
        kid: impl Into<String>,
        pem: &str,
    ) -> Result<Self, AuthError> {
        let kid = kid.into();
        if kid.is_empty() {
            return Err(errors::config_missing("tool_key.kid"));
        }
        let key = EncodingKey::from_rsa_pem(pem.trim().as_bytes())
            .map_err(|err| errors::config_missing(&format!("tool_key.private_key ({err})")))?;
        Ok(Self {
            client_id: client_id.into(),
            kid,
            key,
        })
    }

    pub fn sign(&self, response: &DeepLinkResponse<'_>) -> Result<String, AuthError> {
        self.sign_at(response, Utc::now().timestamp())
    }

    pub fn sign_at(&self, response: &DeepLinkResponse<'_>, now: i64) -> Result<String, AuthError> {
        let items: Vec<Value> = response
            .items
            .iter()
            .map(|item| json!({"type": "ltiResourceLink", "title": item.title, "url": item.url}))
            .collect();

        let mut claims = Map::new();
        claims.insert("iss".into(), Value::String(self.client_id.clone()));
        claims.insert("sub".into(), Value::String(self.client_id.clone()));
        claims.insert("aud".into(), Value::String(response.platform_issuer.to_string()));
        claims.insert("jti".into(), Value::String(uuid::Uuid::new_v4().to_string()));
        claims.insert("iat".into(), json!(now));
        claims.insert("exp".into(), json!(now + DEEP_LINK_RESPONSE_TTL_SECS));
        claims.insert(MESSAGE_TYPE_CLAIM.into(), json!("LtiDeepLinkingResponse"));
        claims.insert(VERSION_CLAIM.into(), json!("1.3.0"));
        if let Some(deployment) = response.deployment_id {
            claims.insert(DEPLOYMENT_ID_CLAIM.into(), json!(deployment));
        }
        claims.insert(CONTENT_ITEMS_CLAIM.into(), Value::Array(items));
        if let Some(data) = response.data {
            claims.insert(DEEP_LINK_DATA_CLAIM.into(), data.clone());
        }

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, &Value::Object(claims), &self.key)
            .map_err(|err| errors::internal(&format!("deep link signing failed: {err}")))
    }
}
