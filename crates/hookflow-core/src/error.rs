use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookflowError {
    // Engine errors
    #[error("No webhook/start node found in workflow")]
    StartNodeNotFound,

    #[error("Missing input for node {node}: {field}")]
    MissingInput { node: String, field: String },

    // Collaborator errors
    #[error("External service failed: {service}: {message}")]
    ExternalService { service: String, message: String },

    #[error("Configuration missing: {0}")]
    Configuration(String),

    // Definition errors
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    // Config file errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HookflowError {
    /// Shorthand for an `ExternalService` error.
    pub fn external(service: impl Into<String>, message: impl ToString) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HookflowError>;
