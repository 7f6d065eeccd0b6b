use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{HookflowError, Result};

/// A workflow definition: an ordered list of nodes plus the connection map
/// that wires node outputs to other nodes by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: HashMap<String, NodeConnections>,
}

impl Workflow {
    /// Parse a workflow from its JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Look up a node by its name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Outgoing targets of a node, flattened slot by slot, in declaration order.
    pub fn targets<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.connections
            .get(name)
            .into_iter()
            .flat_map(|c| c.main.iter())
            .flat_map(|slot| slot.iter())
            .map(|t| t.node.as_str())
    }

    /// Check structural invariants.
    ///
    /// Duplicate node names are rejected. Connections that reference unknown
    /// nodes are tolerated at run time (the branch is skipped), so they are
    /// returned as warnings instead.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(HookflowError::InvalidWorkflow(
                    "node with empty name".to_string(),
                ));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(HookflowError::InvalidWorkflow(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
        }

        let mut warnings = Vec::new();
        let mut sources: Vec<&String> = self.connections.keys().collect();
        sources.sort();
        for source in sources {
            if !seen.contains(source.as_str()) {
                warnings.push(format!("connection source '{}' is not a node", source));
            }
            for target in self.targets(source) {
                if !seen.contains(target) {
                    warnings.push(format!(
                        "connection '{}' -> '{}' targets an unknown node",
                        source, target
                    ));
                }
            }
        }

        for w in &warnings {
            warn!(workflow = self.id.as_deref().unwrap_or("-"), "{}", w);
        }
        Ok(warnings)
    }
}

/// A single node in a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unique within the workflow; used for connections and result storage.
    pub name: String,
    /// Type tag, e.g. `n8n-nodes-base.httpRequest`.
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(
        rename = "webhookId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub webhook_id: Option<String>,
}

impl Node {
    /// Create a node with no parameters.
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            node_type: node_type.into(),
            parameters: Map::new(),
            webhook_id: None,
        }
    }

    /// Set a top-level parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Set the webhook id.
    pub fn with_webhook_id(mut self, id: impl Into<String>) -> Self {
        self.webhook_id = Some(id.into());
        self
    }

    /// Look up a parameter by dotted path (`options.fileName`).
    pub fn param(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.parameters.get(first)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Look up a non-empty string parameter.
    pub fn param_str(&self, path: &str) -> Option<&str> {
        self.param(path)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// `{name, value}` pairs stored under `<path>.parameters`, the layout the
    /// exported format uses for headers and keypair bodies.
    pub fn param_pairs(&self, path: &str) -> Vec<(String, String)> {
        let Some(list) = self
            .param(path)
            .and_then(|v| v.get("parameters"))
            .and_then(|v| v.as_array())
        else {
            return vec![];
        };

        list.iter()
            .filter_map(|entry| {
                let name = entry.get("name")?.as_str()?;
                let value = match entry.get("value") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Some((name.to_string(), value))
            })
            .collect()
    }
}

/// Outputs declared for one source node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConnections {
    /// Output slots, each an ordered list of targets.
    #[serde(default)]
    pub main: Vec<Vec<ConnectionTarget>>,
}

/// One edge endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTarget {
    pub node: String,
    #[serde(rename = "type", default = "default_connection_type")]
    pub kind: String,
    #[serde(default)]
    pub index: usize,
}

fn default_connection_type() -> String {
    "main".to_string()
}

impl ConnectionTarget {
    pub fn main(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            kind: default_connection_type(),
            index: 0,
        }
    }
}

/// The unit of data flowing between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub json: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl Item {
    pub fn new(json: Value) -> Self {
        Self {
            json,
            headers: None,
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }
}

/// The payload that triggered a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerInput {
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
}

impl TriggerInput {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    /// The trigger body, with a missing body treated as an empty object.
    pub fn payload(&self) -> Value {
        match &self.body {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        }
    }

    /// The single item the start node is seeded with.
    pub fn to_item(&self) -> Item {
        Item::new(self.payload()).with_headers(self.headers.clone())
    }
}

/// An outbound HTTP request issued by a workflow node.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Response returned by an [`HttpTransport`](crate::traits::HttpTransport).
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub data: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Prompt handed to a chat-completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: Option<String>,
    pub prompt: String,
}

impl ChatPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Text produced by a chat-completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
}
