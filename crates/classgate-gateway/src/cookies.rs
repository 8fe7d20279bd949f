//! Cookie names and attributes used across the launch flow. Launch cookies
//! are cross-site (`SameSite=None; Secure`) because the tool runs framed
//! inside the platform.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;

pub const STATE_COOKIE: &str = "lti_state";
pub const NONCE_COOKIE: &str = "lti_nonce";
pub const USER_COOKIE: &str = "lti_user";

pub const SESSION_MAX_AGE_SECS: u64 = 300;
pub const USER_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// First value of `name` across all `Cookie` headers. Empty values count as
/// absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn cross_site(name: &str, value: &str, max_age: u64) -> String {
    format!("{name}={value}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age={max_age}")
}

pub fn session_cookie(name: &str, value: &str) -> String {
    cross_site(name, value, SESSION_MAX_AGE_SECS)
}

pub fn user_cookie(user: &str) -> String {
    cross_site(USER_COOKIE, user, USER_MAX_AGE_SECS)
}

pub fn clear_cookie(name: &str) -> String {
    cross_site(name, "", 0)
}

/// Expires both handshake cookies.
pub fn clear_session() -> [String; 2] {
    [clear_cookie(STATE_COOKIE), clear_cookie(NONCE_COOKIE)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_named_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; lti_state=abc"));
        headers.append(COOKIE, HeaderValue::from_static("lti_user=u-1"));
        assert_eq!(read_cookie(&headers, STATE_COOKIE).as_deref(), Some("abc"));
        assert_eq!(read_cookie(&headers, USER_COOKIE).as_deref(), Some("u-1"));
        assert_eq!(read_cookie(&headers, NONCE_COOKIE), None);
    }

    #[test]
    fn empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("lti_user=; other=x"));
        assert_eq!(read_cookie(&headers, USER_COOKIE), None);
    }

    #[test]
    fn launch_cookies_carry_cross_site_attributes() {
        let state = session_cookie(STATE_COOKIE, "s-1");
        assert_eq!(
            state,
            "lti_state=s-1; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=300"
        );
        assert!(user_cookie("u").ends_with("Max-Age=2592000"));
        assert!(clear_cookie(NONCE_COOKIE).starts_with("lti_nonce=; "));
        assert!(clear_cookie(NONCE_COOKIE).ends_with("Max-Age=0"));
    }
}
