use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MESSAGE_TYPE_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
pub const VERSION_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
pub const DEPLOYMENT_ID_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
pub const CONTEXT_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
pub const ROLES_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
pub const DEEP_LINKING_SETTINGS_CLAIM: &str =
    "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings";
pub const CONTENT_ITEMS_CLAIM: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/content_items";
pub const DEEP_LINK_DATA_CLAIM: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/data";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageType {
    ResourceLink,
    DeepLinking,
    Other(String),
}

impl MessageType {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("LtiResourceLinkRequest") => MessageType::ResourceLink,
            Some("LtiDeepLinkingRequest") => MessageType::DeepLinking,
            Some(other) => MessageType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageType::ResourceLink => "LtiResourceLinkRequest",
            MessageType::DeepLinking => "LtiDeepLinkingRequest",
            MessageType::Other(raw) => raw,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeepLinkSettings {
    #[serde(default)]
    pub deep_link_return_url: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Verified claim set of a platform `id_token`.
#[derive(Clone, Debug)]
pub struct PlatformClaims {
    pub issuer: String,
    pub subject: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub nonce: Option<String>,
    pub message_type: MessageType,
    pub deployment_id: Option<String>,
    pub deep_linking: Option<DeepLinkSettings>,
    pub context_id: Option<String>,
    pub context_title: Option<String>,
    pub roles: Vec<String>,
}

fn text(map: &Map<String, Value>, field: &str) -> Option<String> {
    match map.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

impl PlatformClaims {
    pub fn from_claims(map: &Map<String, Value>) -> Self {
        let context = map.get(CONTEXT_CLAIM).and_then(Value::as_object);
        Self {
            issuer: text(map, "iss").unwrap_or_default(),
            subject: text(map, "sub"),
            email: text(map, "email"),
            name: text(map, "name"),
            nonce: text(map, "nonce"),
            message_type: MessageType::parse(map.get(MESSAGE_TYPE_CLAIM).and_then(Value::as_str)),
            deployment_id: text(map, DEPLOYMENT_ID_CLAIM),
            deep_linking: map
                .get(DEEP_LINKING_SETTINGS_CLAIM)
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok()),
            context_id: context.and_then(|c| text(c, "id")),
            context_title: context.and_then(|c| text(c, "title")),
            roles: map
                .get(ROLES_CLAIM)
                .and_then(Value::as_array)
                .map(|roles| {
                    roles
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// The raw value identity is derived from: email when present, else subject.
    pub fn identity_source(&self) -> Option<&str> {
        self.email.as_deref().or(self.subject.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_lti_claims() {
        let claims = json!({
            "iss": "https://canvas.example",
            "sub": "s-1",
            "nonce": "n-1",
            MESSAGE_TYPE_CLAIM: "LtiDeepLinkingRequest",
            DEPLOYMENT_ID_CLAIM: "dep-9",
            DEEP_LINKING_SETTINGS_CLAIM: {
                "deep_link_return_url": "https://canvas.example/return",
                "data": "opaque"
            },
            CONTEXT_CLAIM: {"id": "c1", "title": "English 101"},
            ROLES_CLAIM: ["Learner"]
        });
        let parsed = PlatformClaims::from_claims(claims.as_object().unwrap());
        assert_eq!(parsed.message_type, MessageType::DeepLinking);
        assert_eq!(parsed.deployment_id.as_deref(), Some("dep-9"));
        let dl = parsed.deep_linking.as_ref().unwrap();
        assert_eq!(
            dl.deep_link_return_url.as_deref(),
            Some("https://canvas.example/return")
        );
        assert_eq!(dl.data, Some(json!("opaque")));
        assert_eq!(parsed.context_title.as_deref(), Some("English 101"));
        assert_eq!(parsed.roles, vec!["Learner"]);
        assert_eq!(parsed.identity_source(), Some("s-1"));
    }

    #[test]
    fn missing_message_type_is_a_resource_launch() {
        let claims = json!({"iss": "i", "email": "A@B.c", "sub": "s"});
        let parsed = PlatformClaims::from_claims(claims.as_object().unwrap());
        assert_eq!(parsed.message_type, MessageType::ResourceLink);
        assert_eq!(parsed.identity_source(), Some("A@B.c"));
    }
}
