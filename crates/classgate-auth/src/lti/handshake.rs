use std::sync::Arc;

use classgate_types::prelude::UserId;
use url::Url;

use super::form::auto_post_form;
use crate::authn::{
    AppTokenService, DeepLinkResponse, DeepLinkSigner, PlatformTokenVerifier, ResourceLinkItem,
};
use crate::errors::{self, HandshakeError};
use crate::identity::derive_user_id;
use crate::model::{MessageType, PlatformClaims};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    LoginRequested,
    RedirectedToPlatform,
    CallbackReceived,
    DeepLinkResponded,
    LaunchCompleted,
    Terminal,
}

impl HandshakeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeState::LoginRequested => "LoginRequested",
            HandshakeState::RedirectedToPlatform => "RedirectedToPlatform",
            HandshakeState::CallbackReceived => "CallbackReceived",
            HandshakeState::DeepLinkResponded => "DeepLinkResponded",
            HandshakeState::LaunchCompleted => "LaunchCompleted",
            HandshakeState::Terminal => "Terminal",
        }
    }
}

fn enter(state: HandshakeState) {
    tracing::info!(target = "classgate::auth::lti", state = state.as_str(), "handshake");
}

fn abort(err: HandshakeError) -> HandshakeError {
    tracing::warn!(
        target = "classgate::auth::lti",
        state = HandshakeState::Terminal.as_str(),
        "handshake aborted: {err}"
    );
    err
}

#[derive(Clone, Debug)]
pub struct LtiSettings {
    pub issuer: String,
    pub client_id: String,
    pub authorization_endpoint: String,
    pub redirect_uri: String,
    /// Where completed launches land; also the target of deep-linked items.
    pub app_root: String,
    pub content_title: String,
}

#[derive(Clone, Debug, Default)]
pub struct LoginRequest {
    pub iss: Option<String>,
    pub login_hint: Option<String>,
    pub lti_message_hint: Option<String>,
}

/// The single-use values bound to the browser at login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchSession {
    pub state: String,
    pub nonce: String,
}

#[derive(Clone, Debug)]
pub struct LoginRedirect {
    pub location: String,
    pub session: LaunchSession,
}

#[derive(Clone, Debug, Default)]
pub struct CallbackRequest {
    pub id_token: Option<String>,
    pub state: Option<String>,
}

/// Session values read back from the browser at callback time.
#[derive(Clone, Debug, Default)]
pub struct StoredSession {
    pub state: Option<String>,
    pub nonce: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DeepLinkDelivery {
    pub return_url: String,
    pub jwt: String,
    pub html: String,
}

#[derive(Clone, Debug)]
pub struct CompletedLaunch {
    pub user: UserId,
    pub app_token: String,
    pub redirect: String,
}

#[derive(Clone, Debug)]
pub enum LaunchOutcome {
    DeepLink(DeepLinkDelivery),
    Launch(CompletedLaunch),
}

pub struct LtiHandshake {
    settings: LtiSettings,
    verifier: Arc<dyn PlatformTokenVerifier>,
    tokens: AppTokenService,
    signer: Option<Arc<DeepLinkSigner>>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl LtiHandshake {
    pub fn new(
        settings: LtiSettings,
        verifier: Arc<dyn PlatformTokenVerifier>,
        tokens: AppTokenService,
    ) -> Self {
        Self {
            settings,
            verifier,
            tokens,
            signer: None,
        }
    }

    /// Without a signer, deep-linking requests fail as unconfigured.
    pub fn with_signer(mut self, signer: Arc<DeepLinkSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn settings(&self) -> &LtiSettings {
        &self.settings
    }

    pub fn initiate_login(&self, request: &LoginRequest) -> Result<LoginRedirect, HandshakeError> {
        enter(HandshakeState::LoginRequested);
        let login_hint = non_empty(&request.login_hint)
            .ok_or(HandshakeError::MissingHint("login_hint"))
            .map_err(abort)?;
        let message_hint = non_empty(&request.lti_message_hint)
            .ok_or(HandshakeError::MissingHint("lti_message_hint"))
            .map_err(abort)?;
        if let Some(iss) = non_empty(&request.iss) {
            if iss != self.settings.issuer {
                tracing::warn!(
                    target = "classgate::auth::lti",
                    iss,
                    "login initiated by an unexpected issuer"
                );
            }
        }

        let session = LaunchSession {
            state: uuid::Uuid::new_v4().to_string(),
            nonce: uuid::Uuid::new_v4().to_string(),
        };
        let mut location = Url::parse(&self.settings.authorization_endpoint)
            .map_err(|err| {
                errors::config_missing(&format!("lti.authorization_endpoint ({err})"))
            })
            .map_err(HandshakeError::from)
            .map_err(abort)?;
        location
            .query_pairs_mut()
            .append_pair("response_type", "id_token")
            .append_pair("response_mode", "form_post")
            .append_pair("scope", "openid")
            .append_pair("prompt", "none")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("state", &session.state)
            .append_pair("nonce", &session.nonce)
            .append_pair("login_hint", login_hint)
            .append_pair("lti_message_hint", message_hint);

        enter(HandshakeState::RedirectedToPlatform);
        Ok(LoginRedirect {
            location: location.into(),
            session,
        })
    }

    /// Verifies a launch callback and branches on its message type. The
    /// caller clears the stored session whatever the result.
    pub async fn complete_callback(
        &self,
        request: &CallbackRequest,
        stored: &StoredSession,
    ) -> Result<LaunchOutcome, HandshakeError> {
        let claims = self.verify_callback(request, stored).await?;
        match &claims.message_type {
            MessageType::DeepLinking => {
                self.respond_deep_link(&claims).map(LaunchOutcome::DeepLink)
            }
            MessageType::ResourceLink => self.complete_launch(&claims).map(LaunchOutcome::Launch),
            MessageType::Other(raw) => {
                Err(abort(HandshakeError::UnexpectedMessageType(raw.clone())))
            }
        }
    }

    /// Like [`complete_callback`](Self::complete_callback) but only accepts
    /// deep-linking requests.
    pub async fn complete_deep_link(
        &self,
        request: &CallbackRequest,
        stored: &StoredSession,
    ) -> Result<DeepLinkDelivery, HandshakeError> {
        let claims = self.verify_callback(request, stored).await?;
        if claims.message_type != MessageType::DeepLinking {
            return Err(abort(HandshakeError::UnexpectedMessageType(
                claims.message_type.as_str().to_string(),
            )));
        }
        self.respond_deep_link(&claims)
    }

    async fn verify_callback(
        &self,
        request: &CallbackRequest,
        stored: &StoredSession,
    ) -> Result<PlatformClaims, HandshakeError> {
        enter(HandshakeState::CallbackReceived);
        let id_token =
            non_empty(&request.id_token).ok_or_else(|| abort(HandshakeError::MissingToken))?;

        let state_ok = match (non_empty(&request.state), non_empty(&stored.state)) {
            (Some(given), Some(issued)) => given == issued,
            _ => false,
        };
        if !state_ok {
            return Err(abort(HandshakeError::StateMismatch));
        }

        let claims = self.verifier.verify(id_token).await.map_err(abort)?;

        let nonce_ok = match (claims.nonce.as_deref(), non_empty(&stored.nonce)) {
            (Some(claimed), Some(issued)) => claimed == issued,
            _ => false,
        };
        if !nonce_ok {
            return Err(abort(HandshakeError::NonceMismatch));
        }
        Ok(claims)
    }

    fn launch_identity(&self, claims: &PlatformClaims) -> Result<UserId, HandshakeError> {
        claims
            .identity_source()
            .map(derive_user_id)
            .ok_or_else(|| {
                abort(HandshakeError::TokenInvalid(
                    "token has neither email nor sub".into(),
                ))
            })
    }

    fn app_url_with_token(&self, token: &str) -> String {
        let root = &self.settings.app_root;
        let separator = if root.contains('?') { '&' } else { '?' };
        format!("{root}{separator}t={token}")
    }

    fn complete_launch(&self, claims: &PlatformClaims) -> Result<CompletedLaunch, HandshakeError> {
        let user = self.launch_identity(claims)?;
        let app_token = self
            .tokens
            .issue(&user)
            .map_err(HandshakeError::from)
            .map_err(abort)?;
        let redirect = self.app_url_with_token(&app_token);
        tracing::info!(
            target = "classgate::auth::lti",
            state = HandshakeState::LaunchCompleted.as_str(),
            user = %user,
            context = claims.context_id.as_deref().unwrap_or("-"),
            "handshake"
        );
        Ok(CompletedLaunch {
            user,
            app_token,
            redirect,
        })
    }

    fn respond_deep_link(
        &self,
        claims: &PlatformClaims,
    ) -> Result<DeepLinkDelivery, HandshakeError> {
        let settings = claims.deep_linking.as_ref();
        let return_url = settings
            .and_then(|s| s.deep_link_return_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| abort(HandshakeError::DeepLinkSettingsMissing))?
            .to_string();
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| abort(errors::config_missing("tool_key.private_key").into()))?;

        let user = self.launch_identity(claims)?;
        let app_token = self
            .tokens
            .issue(&user)
            .map_err(HandshakeError::from)
            .map_err(abort)?;
        let items = [ResourceLinkItem {
            title: self.settings.content_title.clone(),
            url: self.app_url_with_token(&app_token),
        }];
        let jwt = signer
            .sign(&DeepLinkResponse {
                platform_issuer: &claims.issuer,
                deployment_id: claims.deployment_id.as_deref(),
                data: settings.and_then(|s| s.data.as_ref()),
                items: &items,
            })
            .map_err(HandshakeError::from)
            .map_err(abort)?;
        let html = auto_post_form(&return_url, &[("JWT", &jwt)]);

        enter(HandshakeState::DeepLinkResponded);
        Ok(DeepLinkDelivery {
            return_url,
            jwt,
            html,
        })
    }
}
