use serde_json::{Map, Value};

use crate::entry::{HistoryEntry, KIND_CHAT};

/// Placeholder strings older writers stored instead of a real entry.
const SENTINELS: &[&str] = &["[object Object]", "null", "undefined", "\"\"", "{}"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A JSON object in the current shape.
    Structured(HistoryEntry),
    /// Recovered from a legacy encoding (string-wrapped JSON or raw text).
    Recovered(HistoryEntry),
    Unrecoverable(&'static str),
}

impl DecodeOutcome {
    pub fn into_entry(self) -> Option<HistoryEntry> {
        match self {
            DecodeOutcome::Structured(entry) | DecodeOutcome::Recovered(entry) => Some(entry),
            DecodeOutcome::Unrecoverable(_) => None,
        }
    }
}

fn is_sentinel(raw: &str) -> bool {
    raw.is_empty() || SENTINELS.contains(&raw)
}

fn text_field(map: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| map.get(*name).and_then(Value::as_str))
        .map(str::to_string)
}

fn timestamp_field(map: &Map<String, Value>) -> i64 {
    ["ts", "timestamp"]
        .iter()
        .find_map(|name| match map.get(*name) {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        })
        .unwrap_or(0)
}

fn from_object(map: &Map<String, Value>) -> Option<HistoryEntry> {
    let content = text_field(map, &["content", "text"]);
    let transcript = text_field(map, &["transcript"]);
    if content.is_none() && transcript.is_none() {
        return None;
    }
    Some(HistoryEntry {
        kind: text_field(map, &["kind"]).unwrap_or_else(|| KIND_CHAT.into()),
        role: text_field(map, &["role"]).unwrap_or_else(|| "user".into()),
        content,
        transcript,
        correct_sentence: text_field(map, &["correct_sentence"]),
        feedback: text_field(map, &["feedback", "feedback_text"]),
        ts: timestamp_field(map),
    })
}

fn raw_text(text: &str) -> HistoryEntry {
    HistoryEntry {
        kind: KIND_CHAT.into(),
        role: "user".into(),
        content: Some(text.to_string()),
        transcript: None,
        correct_sentence: None,
        feedback: None,
        ts: 0,
    }
}

/// Decodes one stored list element, trying in order: a JSON object, JSON
/// wrapped in a JSON string, placeholder rejection, then plain text.
pub fn decode_entry(raw: &str) -> DecodeOutcome {
    let trimmed = raw.trim();
    if is_sentinel(trimmed) {
        return DecodeOutcome::Unrecoverable("placeholder");
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => from_object(&map)
            .map(DecodeOutcome::Structured)
            .unwrap_or(DecodeOutcome::Unrecoverable("object without text")),
        Ok(Value::String(inner)) => {
            let inner = inner.trim();
            if is_sentinel(inner) {
                return DecodeOutcome::Unrecoverable("placeholder");
            }
            match serde_json::from_str::<Value>(inner) {
                Ok(Value::Object(map)) => from_object(&map)
                    .map(DecodeOutcome::Recovered)
                    .unwrap_or(DecodeOutcome::Unrecoverable("object without text")),
                Ok(_) => DecodeOutcome::Unrecoverable("wrapped non-object"),
                Err(_) => DecodeOutcome::Recovered(raw_text(inner)),
            }
        }
        Ok(_) => DecodeOutcome::Unrecoverable("non-object json"),
        Err(_) => DecodeOutcome::Recovered(raw_text(trimmed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_entry_decodes() {
        let outcome = decode_entry(
            r#"{"kind":"chat","role":"assistant","content":"Hi!","ts":1700000000000}"#,
        );
        let DecodeOutcome::Structured(entry) = outcome else {
            panic!("expected structured");
        };
        assert_eq!(entry.role, "assistant");
        assert_eq!(entry.content.as_deref(), Some("Hi!"));
        assert_eq!(entry.ts, 1_700_000_000_000);
    }

    #[test]
    fn doubly_encoded_json_is_recovered() {
        let inner = r#"{"role":"user","text":"hello","timestamp":"42"}"#;
        let wrapped = serde_json::to_string(inner).unwrap();
        let DecodeOutcome::Recovered(entry) = decode_entry(&wrapped) else {
            panic!("expected recovered");
        };
        assert_eq!(entry.kind, "chat");
        assert_eq!(entry.content.as_deref(), Some("hello"));
        assert_eq!(entry.ts, 42);
    }

    #[test]
    fn plain_text_becomes_a_timeless_entry() {
        let entry = decode_entry("just some words").into_entry().unwrap();
        assert_eq!(entry.content.as_deref(), Some("just some words"));
        assert_eq!(entry.ts, 0);
    }

    #[test]
    fn placeholders_and_shapeless_values_are_dropped() {
        let dropped = [
            "[object Object]",
            "null",
            "undefined",
            "",
            "  ",
            "\"null\"",
            "42",
            "[1]",
            r#"{"role":"user"}"#,
        ];
        for raw in dropped {
            assert!(
                matches!(decode_entry(raw), DecodeOutcome::Unrecoverable(_)),
                "{raw:?} should be dropped"
            );
        }
    }

    #[test]
    fn speaking_entry_keeps_feedback() {
        let entry = decode_entry(
            r#"{"kind":"speaking","role":"user","transcript":"I goed","correct_sentence":"I went","feedback":"Irregular past.","ts":5}"#,
        )
        .into_entry()
        .unwrap();
        assert_eq!(entry.kind, "speaking");
        assert_eq!(entry.correct_sentence.as_deref(), Some("I went"));
        assert_eq!(entry.feedback.as_deref(), Some("Irregular past."));
    }
}
