//! Mock collaborators and workflow fixtures shared by hookflow tests.
//!
//! Every mock records the calls it receives so tests can assert how many
//! side effects a run issued and with what arguments.

use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use hookflow_core::error::{HookflowError, Result};
use hookflow_core::traits::{ChatCompletion, HttpTransport, UploadService};
use hookflow_core::types::*;

// ── Mock collaborators ──────────────────────────────────────────

/// HTTP transport that answers every request with the same response.
pub struct MockTransport {
    reply: std::result::Result<HttpResponse, String>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new(status: u16, data: Value) -> Self {
        Self {
            reply: Ok(HttpResponse { status, data }),
            requests: Mutex::new(vec![]),
        }
    }

    /// A `200` answer with the given JSON.
    pub fn ok(data: Value) -> Self {
        Self::new(200, data)
    }

    /// A transport whose every request fails at the network level.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpTransport for MockTransport {
    fn request(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
        self.requests.lock().unwrap().push(request);
        let reply = self.reply.clone();
        Box::pin(async move { reply.map_err(|m| HookflowError::external("http", m)) })
    }
}

/// Upload service that returns a canned document.
pub struct MockUploader {
    reply: std::result::Result<Value, String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockUploader {
    pub fn new(reply: Value) -> Self {
        Self {
            reply: Ok(reply),
            calls: Mutex::new(vec![]),
        }
    }

    /// Uploader that behaves as if its credentials were never configured.
    pub fn unconfigured() -> Self {
        Self {
            reply: Err("upload credentials missing".into()),
            calls: Mutex::new(vec![]),
        }
    }

    /// Recorded `(payload, filename)` pairs.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockUploader {
    fn default() -> Self {
        Self::new(json!({ "secure_url": "https://files.example/file.webm" }))
    }
}

impl UploadService for MockUploader {
    fn upload(&self, base64_payload: String, filename: String) -> BoxFuture<'_, Result<Value>> {
        self.calls.lock().unwrap().push((base64_payload, filename));
        let reply = self.reply.clone();
        Box::pin(async move { reply.map_err(HookflowError::Configuration) })
    }
}

/// Chat completion that always answers with the same text.
pub struct MockChat {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<ChatPrompt>>,
}

impl MockChat {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn prompts(&self) -> Vec<ChatPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockChat {
    fn default() -> Self {
        Self::new("ok")
    }
}

impl ChatCompletion for MockChat {
    fn complete(&self, prompt: ChatPrompt) -> BoxFuture<'_, Result<Completion>> {
        self.prompts.lock().unwrap().push(prompt);
        let reply = self.reply.clone();
        Box::pin(async move {
            reply
                .map(|text| Completion { text })
                .map_err(|m| HookflowError::external("chat", m))
        })
    }
}

// ── Workflow fixtures ───────────────────────────────────────────

pub const WEBHOOK: &str = "n8n-nodes-base.webhook";
pub const RESPOND: &str = "n8n-nodes-base.respondToWebhook";
pub const HTTP_REQUEST: &str = "n8n-nodes-base.httpRequest";
pub const CONVERT_TO_FILE: &str = "n8n-nodes-base.convertToFile";
pub const WAIT: &str = "n8n-nodes-base.wait";
pub const CODE: &str = "n8n-nodes-base.code";
pub const AGENT: &str = "@n8n/n8n-nodes-langchain.agent";

/// Build a workflow from nodes and `(from, to)` edges.
///
/// Edges from the same source share one output slot, in the order given.
pub fn workflow(nodes: Vec<Node>, edges: &[(&str, &str)]) -> Workflow {
    let mut wf = Workflow {
        id: Some("test".to_string()),
        nodes,
        ..Default::default()
    };
    for (from, to) in edges {
        let conns = wf.connections.entry(from.to_string()).or_default();
        if conns.main.is_empty() {
            conns.main.push(vec![]);
        }
        conns.main[0].push(ConnectionTarget::main(*to));
    }
    wf
}

/// A webhook trigger node.
pub fn webhook(name: &str) -> Node {
    Node::new(name, WEBHOOK)
}

/// A responder node with a `responseBody` template.
pub fn responder(name: &str, body: &str) -> Node {
    Node::new(name, RESPOND).with_param("responseBody", json!(body))
}

/// An HTTP node pointing at `url`.
pub fn http(name: &str, url: &str) -> Node {
    Node::new(name, HTTP_REQUEST).with_param("url", json!(url))
}

/// An agent node, optionally with a prompt template.
pub fn agent(name: &str, text: Option<&str>) -> Node {
    let node = Node::new(name, AGENT);
    match text {
        Some(t) => node.with_param("text", json!(t)),
        None => node,
    }
}

/// A wait node for `secs` seconds.
pub fn wait(name: &str, secs: f64) -> Node {
    Node::new(name, WAIT).with_param("amount", json!(secs))
}
