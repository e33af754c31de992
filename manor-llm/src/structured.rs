//! Best-effort parsing of structured output.
//!
//! Providers honour JSON mode most of the time. When they don't, the reply is
//! usually still JSON wrapped in prose or a code fence, so the helpers here
//! look for the outermost object or array before giving up.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::LlmError;

/// Object keys under which a list of strings may be returned.
pub const LIST_KEYS: &[&str] = &["events", "facts", "extracted_facts", "results", "items"];

/// Slice out the outermost `{ ... }` in `text`, if any.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Slice out the outermost `[ ... ]` in `text`, if any.
#[must_use]
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse `text` as `T`, falling back to the outermost JSON object inside it.
///
/// # Errors
///
/// Returns [`LlmError::Unparseable`] if neither the whole text nor an embedded
/// object deserializes into `T`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let trimmed = text.trim();
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(first) => extract_json_object(trimmed)
            .and_then(|inner| serde_json::from_str(inner).ok())
            .ok_or_else(|| {
                LlmError::Unparseable(format!("{first}: raw text: '{}'", preview(trimmed)))
            }),
    }
}

/// Parse a list of strings from a bare array or an object keyed by one of [`LIST_KEYS`].
///
/// Non-string array members are skipped. Blank strings are dropped and the
/// rest trimmed. An empty reply is an empty list.
///
/// # Errors
///
/// Returns [`LlmError::Unparseable`] when no list can be found.
pub fn parse_string_list(text: &str) -> Result<Vec<String>, LlmError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(trimmed)
        .ok()
        .or_else(|| extract_json_object(trimmed).and_then(|s| serde_json::from_str(s).ok()))
        .or_else(|| extract_json_array(trimmed).and_then(|s| serde_json::from_str(s).ok()))
        .ok_or_else(|| LlmError::Unparseable(format!("no JSON in '{}'", preview(trimmed))))?;

    let array = match &value {
        Value::Array(items) => items,
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| {
                LlmError::UnexpectedShape(format!("no list under {LIST_KEYS:?}"))
            })?,
        _ => {
            return Err(LlmError::UnexpectedShape(
                "expected a JSON array or object".into(),
            ));
        }
    };

    Ok(array
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

/// JSON schema for `{"events": [string, ...]}`.
#[must_use]
pub fn events_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "events": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Array of event strings"
            }
        },
        "required": ["events"],
        "additionalProperties": false
    })
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Plan {
        mutations: Vec<Value>,
    }

    #[test]
    fn parses_fenced_object() {
        let text = "Sure!\n```json\n{\"mutations\": [{\"tool\": \"move_player\"}]}\n```";
        let plan: Plan = parse_json(text).expect("embedded object");
        assert_eq!(plan.mutations.len(), 1);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let result: Result<Plan, _> = parse_json("no json here");
        assert!(matches!(result, Err(LlmError::Unparseable(_))));
    }

    #[test]
    fn string_list_from_object_or_array() {
        let from_object = parse_string_list(r#"{"events": [" a ", "", "b", 3]}"#).expect("object");
        assert_eq!(from_object, vec!["a", "b"]);

        let from_array = parse_string_list(r#"["x", "y"]"#).expect("array");
        assert_eq!(from_array, vec!["x", "y"]);

        let from_facts = parse_string_list(r#"{"facts": ["stone floors"]}"#).expect("facts key");
        assert_eq!(from_facts, vec!["stone floors"]);
    }

    #[test]
    fn string_list_empty_and_wrong_shape() {
        assert!(parse_string_list("   ").expect("empty").is_empty());
        assert!(parse_string_list(r#"{"other": ["x"]}"#).is_err());
        assert!(parse_string_list("42").is_err());
    }

    #[test]
    fn events_schema_requires_events() {
        let schema = events_schema();
        assert_eq!(schema["required"][0], "events");
    }
}
