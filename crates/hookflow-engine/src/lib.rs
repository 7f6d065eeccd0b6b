pub mod context;
pub mod dispatcher;
pub mod executor;
pub mod expression;
pub mod kind;
pub mod response;
pub mod runner;

pub use context::{ExecutionContext, ResultsMap};
pub use dispatcher::{Collaborators, Dispatcher};
pub use executor::{find_start_node, ExecutionResult, Executor, NodeRun};
pub use kind::NodeKind;
pub use runner::{WebhookReply, WorkflowRunner};
