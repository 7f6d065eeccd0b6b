use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HookflowError, Result};

/// Top-level hookflow configuration.
///
/// Every section is optional; a missing section falls back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

/// Execution engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timeout applied to every outbound HTTP node request.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Wait node duration when `amount` is not configured.
    #[serde(default = "default_wait_secs")]
    pub default_wait_secs: u64,
}

impl EngineConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            default_wait_secs: default_wait_secs(),
        }
    }
}

fn default_http_timeout() -> u64 { 30 }
fn default_wait_secs() -> u64 { 5 }

/// Chat-completion provider used by agent nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: None,
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model_id() -> String { "gpt-4o-mini".to_string() }
fn default_max_tokens() -> u32 { 1200 }
fn default_system_prompt() -> String { "You are a helpful assistant.".to_string() }

/// Upload service credentials (Cloudinary-style API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub cloud_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_upload_preset")]
    pub upload_preset: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            api_key: None,
            api_secret: None,
            upload_preset: default_upload_preset(),
            base_url: None,
        }
    }
}

fn default_upload_preset() -> String { "unsigned".to_string() }

/// Definition store layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Directory of workflow JSON files loaded at startup.
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            workflows_dir: default_workflows_dir(),
        }
    }
}

fn default_key_prefix() -> String { "workflow:".to_string() }
fn default_workflows_dir() -> String { "workflows".to_string() }

/// Log filter override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `hookflow=debug`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String { "hookflow=info,warn".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| HookflowError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Load the file if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse TOML text after expanding `${ENV_VAR}` references.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| HookflowError::Config(e.to_string()))
    }

    /// Fill credentials that were left out of the file from the conventional
    /// environment variables.
    pub fn apply_env_fallbacks(&mut self) {
        fill_from_env(&mut self.llm.api_key, "OPENAI_API_KEY");
        fill_from_env(&mut self.upload.cloud_name, "CLOUDINARY_CLOUD_NAME");
        fill_from_env(&mut self.upload.api_key, "CLOUDINARY_API_KEY");
        fill_from_env(&mut self.upload.api_secret, "CLOUDINARY_API_SECRET");
    }

    /// Resolve the workflows directory relative to `base`.
    pub fn workflows_dir(&self, base: &Path) -> PathBuf {
        let dir = PathBuf::from(&self.store.workflows_dir);
        if dir.is_absolute() {
            dir
        } else {
            base.join(dir)
        }
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.log.as_ref().map(|l| l.filter.as_str())
    }
}

fn fill_from_env(slot: &mut Option<String>, var: &str) {
    // Unexpanded `${VAR}` placeholders count as unset.
    let unset = slot
        .as_deref()
        .map_or(true, |v| v.is_empty() || v.starts_with("${"));
    if unset {
        if let Ok(val) = std::env::var(var) {
            if !val.is_empty() {
                *slot = Some(val);
            }
        }
    }
}

/// Replace `${NAME}` references with environment values.
///
/// Unset variables and an unterminated `${` are left as written.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => out.push_str(&rest[open..open + close + 3]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
