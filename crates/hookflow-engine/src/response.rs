use serde_json::{Map, Value};

use hookflow_core::types::Item;

use crate::context::ResultsMap;

/// Nodes whose name contains this (case-insensitively) produce the reply.
pub const RESPONDER_MARKER: &str = "respond";

/// First responder entry in dispatch order.
pub fn find_responder(results: &ResultsMap) -> Option<(&str, &[Item])> {
    results
        .iter()
        .find(|(name, _)| name.to_lowercase().contains(RESPONDER_MARKER))
}

/// The reply body a run produced, if any responder node ran.
pub fn resolve_response(results: &ResultsMap) -> Option<Value> {
    let (_, items) = find_responder(results)?;
    let payload = items
        .first()
        .map(|item| item.json.clone())
        .unwrap_or_else(|| Value::Object(Map::new()));
    Some(extract_body(payload))
}

/// Unwrap a responder payload's `body`.
///
/// String bodies holding JSON text are decoded; other strings and non-string
/// bodies are returned as they are. A payload without a body is returned whole.
pub fn extract_body(payload: Value) -> Value {
    let body = match payload.get("body") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => {
            Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone())))
        }
        Some(other) => Some(other.clone()),
    };
    body.unwrap_or(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_body() {
        assert_eq!(extract_body(json!({"body": r#"{"x":1}"#})), json!({"x": 1}));
        assert_eq!(extract_body(json!({"body": "plain"})), json!("plain"));
        assert_eq!(extract_body(json!({"body": 5})), json!(5));
        assert_eq!(extract_body(json!({"body": {"y": 2}})), json!({"y": 2}));
        assert_eq!(extract_body(json!({"body": null, "z": 1})), json!({"body": null, "z": 1}));
        assert_eq!(extract_body(json!({"answer": 42})), json!({"answer": 42}));
    }

    #[test]
    fn test_first_responder_wins() {
        let mut results = ResultsMap::new();
        results.insert("input", vec![Item::new(json!({"q": 1}))]);
        results.insert("Respond Early", vec![Item::new(json!({"body": "first"}))]);
        results.insert("respond_late", vec![Item::new(json!({"body": "second"}))]);
        assert_eq!(resolve_response(&results), Some(json!("first")));
    }

    #[test]
    fn test_no_responder() {
        let mut results = ResultsMap::new();
        results.insert("input", vec![Item::new(json!({}))]);
        assert_eq!(resolve_response(&results), None);
    }

    #[test]
    fn test_responder_without_items() {
        let mut results = ResultsMap::new();
        results.insert("RESPOND", vec![]);
        assert_eq!(resolve_response(&results), Some(json!({})));
    }
}
