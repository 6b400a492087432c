use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sampling parameters for a single generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Output of one generation call: reply candidates plus diagnostics such as
/// model name and token usage. A `meta["error"]` entry marks a degraded call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationResult {
    pub replies: Vec<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl GenerationResult {
    pub fn new(replies: Vec<String>, meta: Map<String, Value>) -> Self {
        Self { replies, meta }
    }

    pub fn first_reply(&self) -> Option<&str> {
        self.replies.first().map(String::as_str)
    }

    pub fn error(&self) -> Option<&str> {
        self.meta.get("error").and_then(Value::as_str)
    }
}

// Token usage reported by a backend, normalized to OpenAI field names
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}
