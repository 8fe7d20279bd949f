use classgate_types::prelude::UserId;
use sha2::{Digest, Sha256};

use crate::authn::AppTokenService;

/// One-way identity: sha256 hex of the trimmed, lower-cased email or subject.
pub fn derive_user_id(raw: &str) -> UserId {
    let normalized = raw.trim().to_lowercase();
    UserId(hex::encode(Sha256::digest(normalized.as_bytes())))
}

/// Identity material found on one request, in no particular order.
#[derive(Clone, Debug, Default)]
pub struct IdentityChannels {
    pub uid: Option<String>,
    pub body_token: Option<String>,
    pub query_token: Option<String>,
    pub cookie: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentitySource {
    Explicit,
    Token,
    Cookie,
}

#[derive(Clone)]
pub struct IdentityResolver {
    tokens: Option<AppTokenService>,
}

impl IdentityResolver {
    /// Without a token service only the explicit and cookie channels apply.
    pub fn new(tokens: Option<AppTokenService>) -> Self {
        Self { tokens }
    }

    pub fn resolve(&self, channels: &IdentityChannels) -> Option<UserId> {
        self.resolve_with_source(channels).map(|(user, _)| user)
    }

    pub fn resolve_with_source(
        &self,
        channels: &IdentityChannels,
    ) -> Option<(UserId, IdentitySource)> {
        if let Some(uid) = present(&channels.uid) {
            return Some((UserId::new(uid), IdentitySource::Explicit));
        }
        if let Some(tokens) = &self.tokens {
            let from_token = [present(&channels.body_token), present(&channels.query_token)]
                .into_iter()
                .flatten()
                .find_map(|token| tokens.verify(token));
            if let Some(user) = from_token {
                return Some((user, IdentitySource::Token));
            }
        }
        present(&channels.cookie).map(|cookie| (UserId::new(cookie), IdentitySource::Cookie))
    }
}
