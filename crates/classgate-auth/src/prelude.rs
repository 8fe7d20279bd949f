pub use crate::authn::{
    AppTokenService, DeepLinkSigner, KeySource, PlatformTokenVerifier, PlatformVerifier,
    RemoteKeySet, ToolKeySet,
};
pub use crate::errors::{AuthError, HandshakeError};
pub use crate::identity::{derive_user_id, IdentityChannels, IdentityResolver, IdentitySource};
pub use crate::lti::{
    CallbackRequest, CompletedLaunch, DeepLinkDelivery, LaunchOutcome, LaunchSession,
    LoginRedirect, LoginRequest, LtiHandshake, LtiSettings, StoredSession,
};
pub use crate::model::{MessageType, PlatformClaims};
pub use crate::quota::{
    speaking_amount, CreditReceipt, QuotaCheck, QuotaKind, QuotaLedger, QuotaPolicy, QuotaUsage,
};
