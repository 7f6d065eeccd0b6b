use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hookflow_core::config::LlmConfig;
use hookflow_core::error::{HookflowError, Result};
use hookflow_core::traits::ChatCompletion;
use hookflow_core::types::{ChatPrompt, Completion};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat client. Works with OpenAI, Ollama, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiChat {
    http: Client,
    config: LlmConfig,
}

impl OpenAiChat {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Debug, PartialEq)]
pub(crate) struct OaiMessage {
    role: String,
    content: String,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub(crate) fn build_messages(prompt: &ChatPrompt, default_system: &str) -> Vec<OaiMessage> {
    let system = prompt
        .system
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(default_system);

    vec![
        OaiMessage {
            role: "system".to_string(),
            content: system.to_string(),
        },
        OaiMessage {
            role: "user".to_string(),
            content: prompt.prompt.clone(),
        },
    ]
}

/// Pull the assistant text out of a completion document.
///
/// A document without `choices[0].message.content` is returned as its JSON
/// text so the agent node still has something to emit.
pub(crate) fn extract_text(body: &serde_json::Value) -> String {
    let parsed: std::result::Result<ChatResponse, _> = serde_json::from_value(body.clone());
    match parsed {
        Ok(resp) => match resp.choices.into_iter().next().and_then(|c| c.message.content) {
            Some(text) => text,
            None => {
                warn!("Completion response carried no message content");
                body.to_string()
            }
        },
        Err(e) => {
            warn!(error = %e, "Failed to parse completion response");
            body.to_string()
        }
    }
}

impl ChatCompletion for OpenAiChat {
    fn complete(&self, prompt: ChatPrompt) -> BoxFuture<'_, Result<Completion>> {
        Box::pin(async move {
            let api_key = self
                .config
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| HookflowError::Configuration("OpenAI key missing".to_string()))?;

            let body = ChatRequest {
                model: self.config.model_id.clone(),
                messages: build_messages(&prompt, &self.config.system_prompt),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };

            debug!(model = %self.config.model_id, prompt_len = prompt.prompt.len(), "Sending chat completion");

            let response = self
                .http
                .post(self.endpoint())
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await
                .map_err(|e| HookflowError::external("chat", e))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(HookflowError::external(
                    "chat",
                    format!("HTTP {}: {}", status, body),
                ));
            }

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| HookflowError::external("chat", e))?;

            Ok(Completion {
                text: extract_text(&json),
            })
        })
    }
}
