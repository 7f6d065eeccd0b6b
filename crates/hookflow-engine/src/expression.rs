//! Template expressions embedded in node parameters.
//!
//! Two forms are recognised:
//!
//! - **Whole expression**: the entire string is `={{ path }}` (surrounding
//!   whitespace allowed). Resolves to the raw value at `path`, so numbers and
//!   booleans keep their type.
//! - **Embedded**: any number of `{{ path }}` placeholders inside ordinary
//!   text. Each is replaced by the textual form of its value; the result is
//!   always a string. A leading `=` (expression mode marker) is dropped.
//!
//! Paths are dot-separated field names rooted at the item payload; the
//! `$json` prefix is optional and numeric segments index arrays. Anything else
//! (calls, operators, brackets) is unsupported and resolves to nothing.

use serde_json::Value;
use tracing::debug;

/// A dotted path into an item payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    /// Field names from the root; empty means the whole payload.
    Fields(Vec<String>),
    /// An expression outside the path grammar.
    Unsupported(String),
}

const FORBIDDEN: &[char] = &[
    '(', ')', '[', ']', '{', '}', '"', '\'', '`', '+', '*', '/', '?', ':', '!', '=', '<', '>',
    '&', '|', ',', ';',
];

impl FieldPath {
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim();
        let rest = match expr.strip_prefix("$json") {
            Some("") => return FieldPath::Fields(vec![]),
            Some(rest) => match rest.strip_prefix('.') {
                Some(rest) => rest,
                None => return FieldPath::Unsupported(expr.to_string()),
            },
            None if expr.starts_with('$') || expr.is_empty() => {
                return FieldPath::Unsupported(expr.to_string())
            }
            None => expr,
        };

        let mut fields = Vec::new();
        for segment in rest.split('.') {
            if segment.is_empty()
                || segment.chars().any(|c| c.is_whitespace() || FORBIDDEN.contains(&c))
            {
                return FieldPath::Unsupported(expr.to_string());
            }
            fields.push(segment.to_string());
        }
        FieldPath::Fields(fields)
    }

    /// Walk the payload field by field. Any missing step means "not found".
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let FieldPath::Fields(fields) = self else {
            return None;
        };
        let mut current = root;
        for field in fields {
            current = match current {
                Value::Object(map) => map.get(field)?,
                Value::Array(items) => items.get(field.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// One lexical piece of an embedded template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Path(FieldPath),
}

/// Split text into literal runs and `{{ … }}` placeholders.
///
/// An opening `{{` without a closing `}}` is kept as literal text, as are
/// single braces.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        literal.push_str(&rest[..open]);
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        tokens.push(Token::Path(FieldPath::parse(&after[..close])));
        rest = &after[close + 2..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    Whole(FieldPath),
    Embedded(Vec<Token>),
}

impl Template {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if let Some(inner) = trimmed
            .strip_prefix("={{")
            .and_then(|s| s.strip_suffix("}}"))
        {
            if !inner.contains("{{") && !inner.contains("}}") {
                return Template::Whole(FieldPath::parse(inner));
            }
        }

        let body = text.strip_prefix('=').unwrap_or(text);
        Template::Embedded(tokenize(body))
    }

    /// Whether the template contains at least one placeholder.
    pub fn has_expressions(&self) -> bool {
        match self {
            Template::Whole(_) => true,
            Template::Embedded(tokens) => tokens.iter().any(|t| matches!(t, Token::Path(_))),
        }
    }

    /// Resolve against a payload.
    ///
    /// Whole expressions yield the raw value (objects and arrays as JSON text,
    /// `""` when not found); embedded templates yield a string.
    pub fn resolve(&self, payload: &Value) -> Value {
        match self {
            Template::Whole(path) => match lookup_logged(path, payload) {
                Some(v @ (Value::Object(_) | Value::Array(_))) => Value::String(v.to_string()),
                Some(v) => v.clone(),
                None => Value::String(String::new()),
            },
            Template::Embedded(_) => Value::String(self.render(payload)),
        }
    }

    /// Resolve to text regardless of form.
    pub fn render(&self, payload: &Value) -> String {
        match self {
            Template::Whole(path) => lookup_logged(path, payload)
                .map(value_to_text)
                .unwrap_or_default(),
            Template::Embedded(tokens) => {
                let mut out = String::new();
                for token in tokens {
                    match token {
                        Token::Literal(text) => out.push_str(text),
                        Token::Path(path) => {
                            if let Some(v) = lookup_logged(path, payload) {
                                out.push_str(&value_to_text(v));
                            }
                        }
                    }
                }
                out
            }
        }
    }
}

fn lookup_logged<'a>(path: &FieldPath, payload: &'a Value) -> Option<&'a Value> {
    let found = path.lookup(payload);
    if found.is_none() {
        debug!(path = ?path, "Template path resolved to nothing");
    }
    found
}

/// Text substituted for a value inside a larger string.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse and resolve in one step.
pub fn resolve(template: &str, payload: &Value) -> Value {
    Template::parse(template).resolve(payload)
}

/// Parse and render in one step.
pub fn render(template: &str, payload: &Value) -> String {
    Template::parse(template).render(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_whole_expression_keeps_type() {
        let payload = json!({"a": {"b": 5}});
        assert_eq!(resolve("={{ $json.a.b }}", &payload), json!(5));
        assert_eq!(resolve("  ={{$json.a.b}}  ", &payload), json!(5));
    }

    #[test]
    fn test_embedded_expression_is_text() {
        let payload = json!({"a": {"b": 5}});
        assert_eq!(resolve("value: {{ $json.a.b }}", &payload), json!("value: 5"));
        assert_eq!(render("={{ $json.a.b }}", &payload), "5");
    }

    #[test]
    fn test_whole_expression_stringifies_structures() {
        let payload = json!({"a": {"b": [1, 2]}});
        assert_eq!(resolve("={{ $json.a }}", &payload), json!(r#"{"b":[1,2]}"#));
        assert_eq!(resolve("={{ $json.a.b }}", &payload), json!("[1,2]"));
    }

    #[test]
    fn test_missing_path_resolves_empty() {
        let payload = json!({"a": 1});
        assert_eq!(resolve("={{ $json.x.y }}", &payload), json!(""));
        assert_eq!(render("[{{ $json.a.b }}]", &payload), "[]");
    }

    #[test]
    fn test_multiple_placeholders() {
        let payload = json!({"first": "Ada", "last": "Lovelace", "ok": true, "n": null});
        assert_eq!(
            render("{{ $json.first }} {{ $json.last }} ({{ $json.ok }}, {{ $json.n }})", &payload),
            "Ada Lovelace (true, null)"
        );
    }

    #[test]
    fn test_expression_mode_json_body() {
        let payload = json!({"question": "hi"});
        let text = render(r#"={"q": "{{ $json.question }}", "n": 1}"#, &payload);
        assert_eq!(text, r#"{"q": "hi", "n": 1}"#);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["q"], "hi");
    }

    #[test]
    fn test_literal_braces_survive() {
        let payload = json!({"a": 1});
        assert_eq!(render("{ \"a\": {{ $json.a }} }", &payload), "{ \"a\": 1 }");
        assert_eq!(render("open {{ never closed", &payload), "open {{ never closed");
        assert_eq!(render("}} stray", &payload), "}} stray");
    }

    #[test]
    fn test_plain_text_has_no_expressions() {
        assert!(!Template::parse("hello").has_expressions());
        assert!(!Template::parse("=hello").has_expressions());
        assert!(Template::parse("={{ $json.a }}").has_expressions());
        assert!(Template::parse("x {{ a }}").has_expressions());
        assert_eq!(render("=hello", &json!({})), "hello");
    }

    #[test]
    fn test_path_grammar() {
        assert_eq!(FieldPath::parse("$json"), FieldPath::Fields(vec![]));
        assert_eq!(
            FieldPath::parse(" $json.a.b "),
            FieldPath::Fields(vec!["a".into(), "b".into()])
        );
        assert_eq!(FieldPath::parse("a.b"), FieldPath::Fields(vec!["a".into(), "b".into()]));
        assert!(matches!(FieldPath::parse("$json.a + 1"), FieldPath::Unsupported(_)));
        assert!(matches!(FieldPath::parse("$json[\"a\"]"), FieldPath::Unsupported(_)));
        assert!(matches!(FieldPath::parse("$node.x"), FieldPath::Unsupported(_)));
        assert!(matches!(FieldPath::parse("$json..a"), FieldPath::Unsupported(_)));
        assert!(matches!(FieldPath::parse("a.toUpperCase()"), FieldPath::Unsupported(_)));
        assert!(matches!(FieldPath::parse(""), FieldPath::Unsupported(_)));
    }

    #[test]
    fn test_unsupported_expression_renders_empty() {
        let payload = json!({"a": 1});
        assert_eq!(render("x{{ $json.a + 1 }}y", &payload), "xy");
    }

    #[test]
    fn test_array_index_and_null_steps() {
        let payload = json!({"items": [{"id": 7}], "n": null});
        assert_eq!(resolve("={{ $json.items.0.id }}", &payload), json!(7));
        assert_eq!(resolve("={{ $json.items.9.id }}", &payload), json!(""));
        assert_eq!(resolve("={{ $json.n }}", &payload), Value::Null);
        assert_eq!(resolve("={{ $json.n.x }}", &payload), json!(""));
    }

    #[test]
    fn test_root_payload() {
        let payload = json!({"a": 1});
        assert_eq!(render("{{ $json }}", &payload), r#"{"a":1}"#);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("a {{ x }} b"),
            vec![
                Token::Literal("a ".into()),
                Token::Path(FieldPath::Fields(vec!["x".into()])),
                Token::Literal(" b".into()),
            ]
        );
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_deterministic() {
        let payload = json!({"a": {"b": "c"}});
        let t = Template::parse("{{ $json.a.b }}-{{ $json.a }}");
        assert_eq!(t.render(&payload), t.render(&payload));
    }
}
