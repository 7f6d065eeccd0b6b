use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use hookflow_core::config::EngineConfig;
use hookflow_core::error::{HookflowError, Result};
use hookflow_core::types::{Item, Node, TriggerInput, Workflow};

use crate::context::ExecutionContext;
use crate::dispatcher::{Collaborators, Dispatcher};
use crate::kind::NodeKind;
use crate::response;

/// Reserved name that marks an entry node regardless of its type.
pub const ENTRY_NODE_NAME: &str = "input";

/// The node a run starts from: the first trigger, or the node named `input`.
pub fn find_start_node(workflow: &Workflow) -> Result<&Node> {
    workflow
        .nodes
        .iter()
        .find(|n| NodeKind::of(n) == NodeKind::Trigger || n.name == ENTRY_NODE_NAME)
        .ok_or(HookflowError::StartNodeNotFound)
}

/// One dispatched node in a run trace.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRun {
    pub name: String,
    pub kind: NodeKind,
    pub elapsed_ms: u64,
    /// Number of items the node produced.
    pub items: usize,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub context: ExecutionContext,
    pub trace: Vec<NodeRun>,
    pub total_elapsed_ms: u64,
}

impl ExecutionResult {
    /// The responder's body, if a responder ran.
    pub fn response(&self) -> Option<Value> {
        response::resolve_response(&self.context.results)
    }

    /// The response, or `{"ok": true, "context": …}` when nothing responded.
    pub fn final_payload(&self) -> Value {
        self.response().unwrap_or_else(|| {
            json!({
                "ok": true,
                "context": serde_json::to_value(&self.context).unwrap_or_default(),
            })
        })
    }

    /// Node names in dispatch order.
    pub fn dispatched(&self) -> Vec<&str> {
        self.trace.iter().map(|run| run.name.as_str()).collect()
    }
}

/// Walks a workflow graph depth-first, dispatching every reachable node once.
pub struct Executor {
    dispatcher: Dispatcher,
}

impl Executor {
    pub fn new(services: Collaborators, config: EngineConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(services, config),
        }
    }

    pub async fn execute(&self, workflow: &Workflow, input: TriggerInput) -> Result<ExecutionResult> {
        let started = Instant::now();
        let start = find_start_node(workflow)?;
        let workflow_id = workflow.id.as_deref().unwrap_or("-");
        info!(workflow = workflow_id, start = %start.name, "Run started");

        let mut ctx = ExecutionContext::new(input);
        let seed = vec![ctx.input.to_item()];
        ctx.results.insert(start.name.clone(), seed.clone());

        let mut visited: HashSet<&str> = HashSet::new();
        let mut trace = Vec::new();
        // (node, items from the parent whose edge reached it)
        let mut stack: Vec<(&str, Vec<Item>)> = vec![(start.name.as_str(), seed)];

        while let Some((name, items)) = stack.pop() {
            if visited.contains(name) {
                debug!(node = name, "Already visited, skipping");
                continue;
            }
            let Some(node) = workflow.node(name) else {
                warn!(node = name, "Connection targets a node that does not exist");
                continue;
            };
            visited.insert(name);

            let kind = NodeKind::of(node);
            let node_started = Instant::now();
            let output = match self.dispatcher.dispatch(node, kind, items).await {
                Ok(output) => output,
                Err(e) => {
                    error!(node = name, kind = %kind, error = %e, "Node failed");
                    return Err(e);
                }
            };
            let elapsed_ms = node_started.elapsed().as_millis() as u64;
            info!(node = name, kind = %kind, elapsed_ms, items = output.len(), "Node dispatched");

            trace.push(NodeRun {
                name: name.to_string(),
                kind,
                elapsed_ms,
                items: output.len(),
            });

            let targets: Vec<&str> = workflow
                .targets(name)
                .filter(|t| !visited.contains(t))
                .collect();
            for target in targets.into_iter().rev() {
                stack.push((target, output.clone()));
            }
            // The start node keeps its trigger seed; its children still see the dispatch output.
            if !ctx.results.insert(name, output) {
                debug!(node = name, "Entry already recorded, keeping it");
            }
        }

        let total_elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            workflow = workflow_id,
            nodes = trace.len(),
            total_elapsed_ms,
            "Run finished"
        );
        Ok(ExecutionResult {
            context: ctx,
            trace,
            total_elapsed_ms,
        })
    }
}
