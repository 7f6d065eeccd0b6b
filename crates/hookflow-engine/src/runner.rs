use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use hookflow_core::error::{HookflowError, Result};
use hookflow_core::traits::DefinitionStore;
use hookflow_core::types::{Node, TriggerInput, Workflow};

use crate::executor::{ExecutionResult, Executor};
use crate::kind::NodeKind;

pub const DEFAULT_KEY_PREFIX: &str = "workflow:";

/// What a webhook caller gets back.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookReply {
    pub workflow_id: Option<String>,
    pub body: Value,
    /// Whether a responder node produced `body`.
    pub responded: bool,
}

/// Stores workflow definitions and runs them on demand.
pub struct WorkflowRunner {
    store: Arc<dyn DefinitionStore>,
    executor: Executor,
    key_prefix: String,
}

impl WorkflowRunner {
    pub fn new(store: Arc<dyn DefinitionStore>, executor: Executor) -> Self {
        Self {
            store,
            executor,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Validate and store a workflow, returning its id.
    ///
    /// The explicit id wins over the workflow's own; a fresh UUID is used
    /// when neither is set.
    pub async fn save(&self, id: Option<&str>, mut workflow: Workflow) -> Result<String> {
        workflow.validate()?;
        let id = id
            .map(str::to_string)
            .or_else(|| workflow.id.clone().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        workflow.id = Some(id.clone());
        self.store.put(&self.key(&id), workflow).await?;
        info!(id = %id, "Workflow saved");
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Workflow>> {
        self.store.get(&self.key(id)).await
    }

    pub async fn list(&self) -> Result<Vec<Workflow>> {
        let keys = self.store.list(&self.key_prefix).await?;
        let mut workflows = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.get(&key).await? {
                Some(wf) => workflows.push(wf),
                None => debug!(key = %key, "Listed workflow vanished before read"),
            }
        }
        Ok(workflows)
    }

    pub async fn run(&self, id: &str, input: TriggerInput) -> Result<ExecutionResult> {
        let workflow = self
            .get(id)
            .await?
            .ok_or_else(|| HookflowError::WorkflowNotFound(id.to_string()))?;
        self.executor.execute(&workflow, input).await
    }

    /// First stored workflow whose webhook node answers to `path_or_id`.
    pub async fn find_by_webhook(&self, path_or_id: &str) -> Result<Option<Workflow>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|wf| wf.nodes.iter().any(|n| answers_webhook(n, path_or_id))))
    }

    pub async fn handle_webhook(&self, path_or_id: &str, input: TriggerInput) -> Result<WebhookReply> {
        let workflow = self
            .find_by_webhook(path_or_id)
            .await?
            .ok_or_else(|| HookflowError::WorkflowNotFound(path_or_id.to_string()))?;
        debug!(webhook = path_or_id, workflow = ?workflow.id, "Webhook matched");

        let result = self.executor.execute(&workflow, input).await?;
        let (body, responded) = match result.response() {
            Some(body) => (body, true),
            None => (result.final_payload(), false),
        };
        Ok(WebhookReply {
            workflow_id: workflow.id,
            body,
            responded,
        })
    }
}

fn answers_webhook(node: &Node, path_or_id: &str) -> bool {
    let webhook_capable =
        NodeKind::of(node) == NodeKind::Trigger || node.name.to_lowercase().contains("input");
    webhook_capable
        && (node.param_str("path") == Some(path_or_id)
            || node.webhook_id.as_deref() == Some(path_or_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answers_webhook() {
        let node = Node::new("Webhook", "n8n-nodes-base.webhook").with_param("path", json!("ask"));
        assert!(answers_webhook(&node, "ask"));
        assert!(!answers_webhook(&node, "other"));

        let node = Node::new("User Input", "n8n-nodes-base.set").with_webhook_id("abc-123");
        assert!(answers_webhook(&node, "abc-123"));

        let node = Node::new("Call", "n8n-nodes-base.httpRequest").with_param("path", json!("ask"));
        assert!(!answers_webhook(&node, "ask"));
    }
}
