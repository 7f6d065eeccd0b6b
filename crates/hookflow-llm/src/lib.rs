pub mod providers;

use std::sync::Arc;

use hookflow_core::config::LlmConfig;
use hookflow_core::traits::ChatCompletion;

pub use providers::openai::OpenAiChat;

/// Create a chat client for the configured provider.
///
/// OpenAI, Ollama, vLLM, Groq and OpenRouter all accept the OpenAI-compatible
/// protocol, so `base_url` is what tells them apart.
pub fn create_client(config: &LlmConfig) -> Arc<dyn ChatCompletion> {
    tracing::debug!(provider = %config.provider, model = %config.model_id, "Creating chat client");
    Arc::new(OpenAiChat::new(config.clone()))
}
