use crate::config::LlmConfig;
use crate::llm::models::{GenerationOptions, GenerationResult, TokenUsage};
use crate::llm::{LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info};

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    context_window_size: usize,
}

#[derive(Serialize, Debug)]
struct OllamaRequest {
    model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    num_ctx: usize,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    // Use serde to ignore unknown fields
    #[serde(flatten)]
    #[allow(dead_code)]
    extra: std::collections::HashMap<String, serde_json::Value>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            context_window_size: config.context_window_size,
        })
    }

    fn build_request(
        &self,
        system_prompt: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            system: system_prompt.to_string(),
            prompt: prompt.to_string(),
            stream: false, // Explicitly disable streaming
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                num_ctx: self.context_window_size,
            },
        }
    }

    fn parse_response(&self, body: &str) -> Result<GenerationResult, LlmError> {
        let ollama_response = serde_json::from_str::<OllamaResponse>(body).map_err(|e| {
            error!("Failed to parse Ollama response: {} - Response was: {}", e, body);
            LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
        })?;

        if let Some(message) = ollama_response.error {
            return Err(LlmError::ResponseError(message));
        }

        let prompt_tokens = ollama_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = ollama_response.eval_count.unwrap_or(0);
        let usage = TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        };

        let mut meta = Map::new();
        meta.insert(
            "model".to_string(),
            Value::String(ollama_response.model.unwrap_or_else(|| self.model.clone())),
        );
        meta.insert(
            "usage".to_string(),
            serde_json::to_value(usage).map_err(|e| LlmError::ResponseError(e.to_string()))?,
        );

        // Ollama reports an empty completion as an empty string
        let replies = if ollama_response.response.trim().is_empty() {
            Vec::new()
        } else {
            vec![ollama_response.response]
        };

        Ok(GenerationResult::new(replies, meta))
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, LlmError> {
        let request = self.build_request(system_prompt, prompt, options);

        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            // Try to get the error message from the response body
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        debug!("Raw response from Ollama: {}", response_text);
        self.parse_response(&response_text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
