use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Definition store - key/value access to workflow definitions.
///
/// Only touched before or after a run, never during traversal.
pub trait DefinitionStore: Send + Sync + 'static {
    /// Fetch a workflow by key.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Workflow>>>;

    /// Store a workflow under a key, replacing any previous value.
    fn put(&self, key: &str, workflow: Workflow) -> BoxFuture<'_, Result<()>>;

    /// List the keys that start with `prefix`.
    fn list(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<String>>>;
}

/// HTTP transport - outbound requests issued by HTTP nodes.
///
/// Network and timeout failures are errors; a non-2xx status is returned as
/// a normal response and left to the caller.
pub trait HttpTransport: Send + Sync + 'static {
    fn request(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>>;
}

/// Upload service - turns a base64 payload into a hosted file.
pub trait UploadService: Send + Sync + 'static {
    /// Upload the payload and return the service's response document.
    fn upload(
        &self,
        base64_payload: String,
        filename: String,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;
}

/// Chat completion - single-turn prompt to text.
pub trait ChatCompletion: Send + Sync + 'static {
    fn complete(&self, prompt: ChatPrompt) -> BoxFuture<'_, Result<Completion>>;
}
