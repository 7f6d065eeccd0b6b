use std::fmt;

use serde::Serialize;

use hookflow_core::types::Node;

/// Node behaviours the dispatcher knows how to run.
///
/// Classified from the last `.`-separated segment of the node's type tag, so
/// `n8n-nodes-base.httpRequest` and a bare `httpRequest` are the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    Responder,
    HttpRequest,
    ConvertToFile,
    Wait,
    Code,
    Agent,
    /// Passes its input through unchanged.
    Unknown,
}

impl NodeKind {
    pub fn from_type_tag(tag: &str) -> Self {
        let last = tag.rsplit('.').next().unwrap_or(tag).to_ascii_lowercase();
        match last.as_str() {
            "webhook" => NodeKind::Trigger,
            s if s.ends_with("trigger") => NodeKind::Trigger,
            "respondtowebhook" => NodeKind::Responder,
            "httprequest" => NodeKind::HttpRequest,
            "converttofile" => NodeKind::ConvertToFile,
            "wait" => NodeKind::Wait,
            "code" | "function" | "functionitem" => NodeKind::Code,
            "agent" => NodeKind::Agent,
            _ if tag.to_ascii_lowercase().contains("langchain") => NodeKind::Agent,
            _ => NodeKind::Unknown,
        }
    }

    /// Kind of a node, falling back to its name when the type tag is empty.
    pub fn of(node: &Node) -> Self {
        if node.node_type.trim().is_empty() {
            Self::from_type_tag(&node.name)
        } else {
            Self::from_type_tag(&node.node_type)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Trigger => "trigger",
            NodeKind::Responder => "responder",
            NodeKind::HttpRequest => "http_request",
            NodeKind::ConvertToFile => "convert_to_file",
            NodeKind::Wait => "wait",
            NodeKind::Code => "code",
            NodeKind::Agent => "agent",
            NodeKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
