use serde_json::Value;

use crate::errors::{self, AuthError};

/// The tool's public key set as published to platforms. The configured JSON
/// is served verbatim once it is known to hold a non-empty `keys` array.
#[derive(Clone, Debug)]
pub struct ToolKeySet {
    raw: String,
}

impl ToolKeySet {
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let parsed: Value = serde_json::from_str(raw)
            .map_err(|err| errors::config_missing(&format!("tool_key.public_jwks is not JSON ({err})")))?;
        let has_keys = parsed
            .get("keys")
            .and_then(Value::as_array)
            .is_some_and(|keys| !keys.is_empty());
        if !has_keys {
            return Err(errors::config_missing("tool_key.public_jwks has no keys"));
        }
        Ok(Self {
            raw: raw.trim().to_string(),
        })
    }

    pub fn as_json(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_fixture_and_rejects_empty_sets() {
        let jwks = ToolKeySet::parse(include_str!("../../tests/fixtures/tool_jwks.json")).unwrap();
        assert!(jwks.as_json().contains("tool-key-1"));
        assert!(ToolKeySet::parse(r#"{"keys":[]}"#).is_err());
        assert!(ToolKeySet::parse("nope").is_err());
    }
}
