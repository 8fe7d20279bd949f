pub mod app_token;
pub mod deep_link;
pub mod jwks;
pub mod platform;
pub mod tool_keys;

pub use app_token::AppTokenService;
pub use deep_link::{DeepLinkResponse, DeepLinkSigner, ResourceLinkItem};
pub use jwks::{Jwk, KeySource, RemoteKeySet};
pub use platform::{PlatformTokenVerifier, PlatformVerifier};
pub use tool_keys::ToolKeySet;
