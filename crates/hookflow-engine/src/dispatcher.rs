use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use hookflow_core::config::EngineConfig;
use hookflow_core::error::{HookflowError, Result};
use hookflow_core::traits::{ChatCompletion, HttpTransport, UploadService};
use hookflow_core::types::{ChatPrompt, HttpRequest, Item, Node};

use crate::expression::{self, FieldPath, Template};
use crate::kind::NodeKind;

const DEFAULT_SOURCE_PROPERTY: &str = "body.file.base64";
const FALLBACK_SOURCE_PROPERTY: &str = "file.base64";
const DEFAULT_FILE_NAME: &str = "file.webm";
const MIN_WAIT: Duration = Duration::from_secs(1);

/// External services a run may call into.
///
/// Built once per process and shared by every run.
#[derive(Clone)]
pub struct Collaborators {
    pub http: Arc<dyn HttpTransport>,
    pub upload: Arc<dyn UploadService>,
    pub chat: Arc<dyn ChatCompletion>,
}

/// Runs a single node against its input items.
pub struct Dispatcher {
    services: Collaborators,
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(services: Collaborators, config: EngineConfig) -> Self {
        Self { services, config }
    }

    pub async fn dispatch(&self, node: &Node, kind: NodeKind, input: Vec<Item>) -> Result<Vec<Item>> {
        match kind {
            NodeKind::Trigger | NodeKind::Code | NodeKind::Unknown => Ok(input),
            NodeKind::Responder => Ok(respond(node, input)),
            NodeKind::HttpRequest => self.http_request(node, &input).await,
            NodeKind::ConvertToFile => self.convert_to_file(node, &input).await,
            NodeKind::Wait => {
                let duration = wait_duration(node, &self.config);
                debug!(node = %node.name, secs = duration.as_secs_f64(), "Waiting");
                tokio::time::sleep(duration).await;
                Ok(input)
            }
            NodeKind::Agent => self.agent(node, &input).await,
        }
    }

    async fn http_request(&self, node: &Node, input: &[Item]) -> Result<Vec<Item>> {
        let payload = first_payload(input);

        let url = node
            .param_str("url")
            .map(|t| expression::render(t, &payload))
            .unwrap_or_default();
        if url.trim().is_empty() {
            return Err(HookflowError::external(
                "http",
                format!("node '{}' has no URL", node.name),
            ));
        }

        let method = node
            .param_str("method")
            .unwrap_or("GET")
            .to_ascii_uppercase();

        let headers = node
            .param_pairs("headerParameters")
            .into_iter()
            .map(|(name, value)| (name, expression::render(&value, &payload)))
            .collect();

        let request = HttpRequest {
            method,
            url,
            headers,
            body: request_body(node, &payload),
            timeout: self.config.http_timeout(),
        };
        debug!(node = %node.name, method = %request.method, url = %request.url, "HTTP node request");

        let response = self.services.http.request(request).await?;
        if !response.is_success() {
            return Err(HookflowError::external(
                "http",
                format!("{}: {}", response.status, response.data),
            ));
        }
        Ok(vec![Item::new(response.data)])
    }

    async fn convert_to_file(&self, node: &Node, input: &[Item]) -> Result<Vec<Item>> {
        let payload = first_payload(input);
        let source = node
            .param_str("sourceProperty")
            .unwrap_or(DEFAULT_SOURCE_PROPERTY);

        let data = non_empty_str(&payload, source)
            .or_else(|| non_empty_str(&payload, FALLBACK_SOURCE_PROPERTY))
            .ok_or_else(|| HookflowError::MissingInput {
                node: node.name.clone(),
                field: source.to_string(),
            })?;

        let filename = node
            .param_str("options.fileName")
            .map(|t| expression::render(t, &payload))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

        let uploaded = self
            .services
            .upload
            .upload(data.to_string(), filename)
            .await?;
        Ok(vec![Item::new(uploaded)])
    }

    async fn agent(&self, node: &Node, input: &[Item]) -> Result<Vec<Item>> {
        let payload = first_payload(input);

        let prompt = node
            .param_str("text")
            .map(|t| expression::render(t, &payload))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| payload.to_string());

        let mut chat = ChatPrompt::new(prompt);
        if let Some(system) = node
            .param_str("options.systemMessage")
            .map(|t| expression::render(t, &payload))
            .filter(|s| !s.trim().is_empty())
        {
            chat = chat.with_system(system);
        }

        let completion = self.services.chat.complete(chat).await?;
        Ok(vec![Item::new(json!({ "output": completion.text }))])
    }
}

/// Payload of the first input item, or `{}` when there is none.
fn first_payload(input: &[Item]) -> Value {
    input
        .first()
        .map(|item| item.json.clone())
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn non_empty_str<'a>(payload: &'a Value, path: &str) -> Option<&'a str> {
    FieldPath::parse(path)
        .lookup(payload)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn respond(node: &Node, input: Vec<Item>) -> Vec<Item> {
    let Some(text) = node.param("responseBody").and_then(Value::as_str) else {
        return input;
    };
    let template = Template::parse(text);
    if !template.has_expressions() {
        return input;
    }
    let body = template.resolve(&first_payload(&input));
    vec![Item::new(json!({ "body": body }))]
}

fn request_body(node: &Node, payload: &Value) -> Option<Value> {
    if node.param_str("specifyBody") == Some("json") {
        match node.param("jsonBody") {
            Some(Value::String(text)) => {
                let rendered = expression::render(text, payload);
                return Some(
                    serde_json::from_str(&rendered).unwrap_or(Value::String(rendered)),
                );
            }
            Some(Value::Null) | None => {}
            Some(other) => return Some(other.clone()),
        }
    }

    let pairs = node.param_pairs("bodyParameters");
    if pairs.is_empty() {
        return None;
    }
    let body: Map<String, Value> = pairs
        .into_iter()
        .map(|(name, value)| (name, Value::String(expression::render(&value, payload))))
        .collect();
    Some(Value::Object(body))
}

fn wait_duration(node: &Node, config: &EngineConfig) -> Duration {
    let amount = match node.param("amount") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|a| a.is_finite() && *a != 0.0)
    .unwrap_or(config.default_wait_secs as f64);

    let multiplier = match node.param_str("unit").unwrap_or("seconds") {
        "seconds" => 1.0,
        "minutes" => 60.0,
        "hours" => 3600.0,
        "days" => 86400.0,
        other => {
            warn!(node = %node.name, unit = other, "Unknown wait unit, using seconds");
            1.0
        }
    };

    let secs = amount * multiplier;
    if secs < MIN_WAIT.as_secs_f64() {
        MIN_WAIT
    } else {
        // Overflowing amounts saturate instead of panicking.
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookflow_test_utils::*;

    struct Harness {
        http: Arc<MockTransport>,
        upload: Arc<MockUploader>,
        chat: Arc<MockChat>,
        dispatcher: Dispatcher,
    }

    fn harness(http: MockTransport, upload: MockUploader, chat: MockChat) -> Harness {
        let http = Arc::new(http);
        let upload = Arc::new(upload);
        let chat = Arc::new(chat);
        let dispatcher = Dispatcher::new(
            Collaborators {
                http: http.clone(),
                upload: upload.clone(),
                chat: chat.clone(),
            },
            EngineConfig::default(),
        );
        Harness {
            http,
            upload,
            chat,
            dispatcher,
        }
    }

    fn default_harness() -> Harness {
        harness(
            MockTransport::ok(json!({"ok": true})),
            MockUploader::default(),
            MockChat::default(),
        )
    }

    fn items(payload: Value) -> Vec<Item> {
        vec![Item::new(payload)]
    }

    async fn run(h: &Harness, node: &Node, input: Vec<Item>) -> Result<Vec<Item>> {
        h.dispatcher.dispatch(node, NodeKind::of(node), input).await
    }

    #[tokio::test]
    async fn test_passthrough_kinds() {
        let h = default_harness();
        let input = items(json!({"a": 1}));
        for node in [
            webhook("input"),
            Node::new("code", CODE),
            Node::new("set", "n8n-nodes-base.set"),
        ] {
            let out = run(&h, &node, input.clone()).await.unwrap();
            assert_eq!(out, input);
        }
    }

    #[tokio::test]
    async fn test_responder_resolves_whole_expression() {
        let h = default_harness();
        let node = responder("Respond", "={{ $json.a.b }}");
        let out = run(&h, &node, items(json!({"a": {"b": 5}}))).await.unwrap();
        assert_eq!(out, items(json!({"body": 5})));

        let node = responder("Respond", "b is {{ $json.a.b }}");
        let out = run(&h, &node, items(json!({"a": {"b": 5}}))).await.unwrap();
        assert_eq!(out, items(json!({"body": "b is 5"})));
    }

    #[tokio::test]
    async fn test_responder_without_expression_passes_through() {
        let h = default_harness();
        let node = responder("Respond", "static");
        let input = items(json!({"x": 1}));
        assert_eq!(run(&h, &node, input.clone()).await.unwrap(), input);

        let node = Node::new("Respond", RESPOND);
        assert_eq!(run(&h, &node, input.clone()).await.unwrap(), input);
    }

    #[tokio::test]
    async fn test_http_request_shape() {
        let h = default_harness();
        let node = http("Call", "https://api.example/{{ $json.id }}")
            .with_param("method", json!("post"))
            .with_param(
                "headerParameters",
                json!({"parameters": [{"name": "X-User", "value": "={{ $json.user }}"}]}),
            )
            .with_param("specifyBody", json!("json"))
            .with_param("jsonBody", json!(r#"={"q": "{{ $json.q }}", "n": 2}"#));

        let out = run(&h, &node, items(json!({"id": 7, "user": "ada", "q": "hi"})))
            .await
            .unwrap();
        assert_eq!(out, items(json!({"ok": true})));

        let requests = h.http.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.url, "https://api.example/7");
        assert_eq!(req.headers, vec![("X-User".to_string(), "ada".to_string())]);
        assert_eq!(req.body, Some(json!({"q": "hi", "n": 2})));
        assert_eq!(req.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_http_unparseable_body_sent_as_text() {
        let h = default_harness();
        let node = http("Call", "https://api.example")
            .with_param("specifyBody", json!("json"))
            .with_param("jsonBody", json!("not {{ $json.q }} json"));
        run(&h, &node, items(json!({"q": "really"}))).await.unwrap();
        assert_eq!(h.http.requests()[0].body, Some(json!("not really json")));
        assert_eq!(h.http.requests()[0].method, "GET");
    }

    #[tokio::test]
    async fn test_http_keypair_body() {
        let h = default_harness();
        let node = http("Call", "https://api.example").with_param(
            "bodyParameters",
            json!({"parameters": [
                {"name": "q", "value": "{{ $json.q }}"},
                {"name": "limit", "value": 3}
            ]}),
        );
        run(&h, &node, items(json!({"q": "rust"}))).await.unwrap();
        assert_eq!(
            h.http.requests()[0].body,
            Some(json!({"q": "rust", "limit": "3"}))
        );
    }

    #[tokio::test]
    async fn test_http_non_success_is_external_error() {
        let h = harness(
            MockTransport::new(500, json!("boom")),
            MockUploader::default(),
            MockChat::default(),
        );
        let err = run(&h, &http("Call", "https://api.example"), items(json!({})))
            .await
            .unwrap_err();
        match err {
            HookflowError::ExternalService { service, message } => {
                assert_eq!(service, "http");
                assert!(message.contains("500"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_http_missing_url_is_error() {
        let h = default_harness();
        let node = Node::new("Call", HTTP_REQUEST);
        let err = run(&h, &node, items(json!({}))).await.unwrap_err();
        assert!(matches!(err, HookflowError::ExternalService { .. }));
        assert_eq!(h.http.call_count(), 0);
    }

    #[tokio::test]
    async fn test_convert_to_file_uploads() {
        let h = default_harness();
        let node = Node::new("Convert", CONVERT_TO_FILE)
            .with_param("options", json!({"fileName": "{{ $json.name }}.webm"}));
        let out = run(
            &h,
            &node,
            items(json!({"name": "clip", "body": {"file": {"base64": "AAAA"}}})),
        )
        .await
        .unwrap();
        assert_eq!(h.upload.calls(), vec![("AAAA".to_string(), "clip.webm".to_string())]);
        assert_eq!(out[0].json["secure_url"], "https://files.example/file.webm");
    }

    #[tokio::test]
    async fn test_convert_to_file_fallback_path_and_default_name() {
        let h = default_harness();
        let node = Node::new("Convert", CONVERT_TO_FILE);
        run(&h, &node, items(json!({"file": {"base64": "BBBB"}})))
            .await
            .unwrap();
        assert_eq!(h.upload.calls(), vec![("BBBB".to_string(), "file.webm".to_string())]);
    }

    #[tokio::test]
    async fn test_convert_to_file_falls_back_on_empty_primary() {
        let h = default_harness();
        let node = Node::new("Convert", CONVERT_TO_FILE);
        for primary in [json!(null), json!(""), json!(12)] {
            run(
                &h,
                &node,
                items(json!({"body": {"file": {"base64": primary}}, "file": {"base64": "AAAA"}})),
            )
            .await
            .unwrap();
        }
        let uploaded: Vec<String> = h.upload.calls().into_iter().map(|(data, _)| data).collect();
        assert_eq!(uploaded, vec!["AAAA", "AAAA", "AAAA"]);
    }

    #[tokio::test]
    async fn test_convert_to_file_missing_input() {
        let h = default_harness();
        let node = Node::new("Convert", CONVERT_TO_FILE);
        for payload in [json!({}), json!({"body": {"file": {"base64": ""}}})] {
            let err = run(&h, &node, items(payload)).await.unwrap_err();
            match err {
                HookflowError::MissingInput { node, field } => {
                    assert_eq!(node, "Convert");
                    assert_eq!(field, "body.file.base64");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        assert!(h.upload.calls().is_empty());
    }

    #[tokio::test]
    async fn test_agent_prompt_from_template() {
        let h = harness(
            MockTransport::ok(json!({})),
            MockUploader::default(),
            MockChat::new("hello"),
        );
        let node = agent("AI", Some("={{ $json.question }}"))
            .with_param("options", json!({"systemMessage": "Be brief."}));
        let out = run(&h, &node, items(json!({"question": "hi"}))).await.unwrap();
        assert_eq!(out, items(json!({"output": "hello"})));
        assert_eq!(
            h.chat.prompts(),
            vec![ChatPrompt::new("hi").with_system("Be brief.")]
        );
    }

    #[tokio::test]
    async fn test_agent_prompt_falls_back_to_payload() {
        let h = default_harness();
        run(&h, &agent("AI", None), items(json!({"question": "hi"})))
            .await
            .unwrap();
        run(&h, &agent("AI", Some("{{ $json.missing }}")), items(json!({"q": 1})))
            .await
            .unwrap();
        let prompts = h.chat.prompts();
        assert_eq!(prompts[0].prompt, r#"{"question":"hi"}"#);
        assert_eq!(prompts[1].prompt, r#"{"q":1}"#);
        assert!(prompts[0].system.is_none());
    }

    #[tokio::test]
    async fn test_agent_failure_propagates() {
        let h = harness(
            MockTransport::ok(json!({})),
            MockUploader::default(),
            MockChat::failing("rate limited"),
        );
        let err = run(&h, &agent("AI", None), items(json!({}))).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn test_wait_duration() {
        let config = EngineConfig::default();
        let secs = |node: Node| wait_duration(&node, &config).as_secs_f64();

        assert_eq!(secs(Node::new("w", WAIT)), 5.0);
        assert_eq!(secs(wait("w", 0.0)), 5.0);
        assert_eq!(secs(wait("w", 2.5)), 2.5);
        assert_eq!(secs(wait("w", 0.2)), 1.0);
        assert_eq!(secs(wait("w", -3.0)), 1.0);
        assert_eq!(secs(Node::new("w", WAIT).with_param("amount", json!("3"))), 3.0);
        assert_eq!(
            secs(wait("w", 2.0).with_param("unit", json!("minutes"))),
            120.0
        );
        assert_eq!(
            secs(wait("w", 2.0).with_param("unit", json!("fortnights"))),
            2.0
        );
    }

    #[test]
    fn test_wait_duration_saturates() {
        let config = EngineConfig::default();
        let days = |amount: f64| {
            wait_duration(&wait("w", amount).with_param("unit", json!("days")), &config)
        };
        assert_eq!(days(1e20), Duration::MAX);
        assert_eq!(days(1e308), Duration::MAX);
        assert_eq!(days(1.0), Duration::from_secs(86400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_passes_input_through() {
        let h = default_harness();
        let input = items(json!({"a": 1}));
        let started = tokio::time::Instant::now();
        let out = run(&h, &wait("Wait", 2.0), input.clone()).await.unwrap();
        assert_eq!(out, input);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
