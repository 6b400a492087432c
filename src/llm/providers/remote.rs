use crate::config::LlmConfig;
use crate::llm::models::{GenerationOptions, GenerationResult, TokenUsage};
use crate::llm::{LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat completions backend.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize, Debug)]
struct PromptRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Debug)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct PromptResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
        })
    }

    fn build_request(
        &self,
        system_prompt: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> PromptRequest {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(Message {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        PromptRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }

    fn parse_response(&self, body: &str) -> Result<GenerationResult, LlmError> {
        let response: PromptResponse = serde_json::from_str(body)
            .map_err(|e| LlmError::ResponseError(format!("Failed to parse response: {}", e)))?;

        if let Some(api_error) = response.error {
            return Err(LlmError::ResponseError(api_error.message));
        }

        let replies: Vec<String> = response
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .collect();

        let mut meta = Map::new();
        meta.insert("model".to_string(), Value::String(self.model.clone()));
        let usage = serde_json::to_value(response.usage.unwrap_or_default())
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;
        meta.insert("usage".to_string(), usage);

        Ok(GenerationResult::new(replies, meta))
    }
}

#[async_trait]
impl TextGenerator for RemoteLlmProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, LlmError> {
        let request = self.build_request(system_prompt, prompt, options);

        info!("Sending request to {} with model: {}", self.api_url, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            error!("API responded with status code: {} - {}", status, body);
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                status
            )));
        }

        debug!("Raw response: {}", body);
        self.parse_response(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> RemoteLlmProvider {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            ..LlmConfig::default()
        };
        RemoteLlmProvider::new(&config).unwrap()
    }

    #[test]
    fn requires_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(
            RemoteLlmProvider::new(&config),
            Err(LlmError::ConfigError(_))
        ));
    }

    #[test]
    fn defaults_to_openai_endpoint() {
        assert_eq!(provider().api_url, DEFAULT_API_URL);
    }

    #[test]
    fn request_puts_system_message_first() {
        let options = GenerationOptions {
            temperature: 0.2,
            max_tokens: 500,
        };
        let request = provider().build_request("be terse", "list users", &options);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be terse");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "list users");
    }

    #[test]
    fn request_skips_empty_system_message() {
        let options = GenerationOptions {
            temperature: 0.1,
            max_tokens: 10,
        };
        let request = provider().build_request("", "list users", &options);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
    }

    #[test]
    fn parses_choices_and_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "SELECT 1"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let result = provider().parse_response(body).unwrap();

        assert_eq!(result.replies, vec!["SELECT 1".to_string()]);
        assert_eq!(result.meta["model"], "gpt-4o-mini");
        assert_eq!(result.meta["usage"]["total_tokens"], 15);
    }

    #[test]
    fn api_error_body_is_an_error() {
        let body = r#"{"error": {"message": "invalid api key"}}"#;
        let err = provider().parse_response(body).unwrap_err();
        assert!(err.to_string().contains("invalid api key"));
    }

    #[test]
    fn missing_choices_yield_no_replies() {
        let result = provider().parse_response(r#"{"choices": []}"#).unwrap();
        assert!(result.replies.is_empty());
    }
}
