pub mod form;
mod handshake;

pub use handshake::{
    CallbackRequest, CompletedLaunch, DeepLinkDelivery, HandshakeState, LaunchOutcome,
    LaunchSession, LoginRedirect, LoginRequest, LtiHandshake, LtiSettings, StoredSession,
};
