pub mod models;
pub mod providers;

use crate::config::{LlmBackend, LlmConfig};
use async_trait::async_trait;
use models::{GenerationOptions, GenerationResult};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use tracing::{debug, error};

/// Reply returned in place of model output when a backend call fails.
pub const APOLOGY_REPLY: &str =
    "Sorry, SQL generation failed. Please check the configuration or try again.";

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// A model backend able to complete a prompt under a system instruction.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, LlmError>;

    fn model(&self) -> &str;
}

/// The generation capability shared by every pipeline stage. Wraps one backend
/// and never fails: backend errors come back as an apology reply with
/// `meta["error"]` set.
pub struct LlmManager {
    generator: Box<dyn TextGenerator>,
    context_window_size: usize,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let generator: Box<dyn TextGenerator> = match config.backend {
            LlmBackend::Remote => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            LlmBackend::Ollama => Box::new(providers::ollama::OllamaProvider::new(config)?),
        };

        Ok(Self::from_generator(generator, config.context_window_size))
    }

    pub fn from_generator(generator: Box<dyn TextGenerator>, context_window_size: usize) -> Self {
        Self {
            generator,
            context_window_size,
        }
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    pub fn context_window_size(&self) -> usize {
        self.context_window_size
    }

    /// Rough token estimate, four characters per token.
    pub fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    pub async fn invoke(
        &self,
        system_prompt: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> GenerationResult {
        debug!("Invoking model {} with options {:?}", self.model(), options);

        match self.generator.generate(system_prompt, prompt, options).await {
            Ok(result) => result,
            Err(e) => {
                error!("LLM generation failed: {}", e);
                let mut meta = Map::new();
                meta.insert("model".to_string(), Value::String(self.model().to_string()));
                meta.insert("error".to_string(), Value::String(e.to_string()));
                GenerationResult::new(vec![APOLOGY_REPLY.to_string()], meta)
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted backend for exercising pipelines without a network.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub enum Scripted {
        Reply(String),
        Empty,
        Fail(String),
    }

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub system_prompt: String,
        pub prompt: String,
        pub options: GenerationOptions,
    }

    #[derive(Default)]
    pub struct ScriptedGenerator {
        script: Mutex<VecDeque<Scripted>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedGenerator {
        pub fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for std::sync::Arc<ScriptedGenerator> {
        async fn generate(
            &self,
            system_prompt: &str,
            prompt: &str,
            options: &GenerationOptions,
        ) -> Result<GenerationResult, LlmError> {
            self.calls.lock().unwrap().push(RecordedCall {
                system_prompt: system_prompt.to_string(),
                prompt: prompt.to_string(),
                options: *options,
            });

            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Reply(text)) => {
                    let mut meta = Map::new();
                    meta.insert("model".to_string(), Value::String("scripted".to_string()));
                    Ok(GenerationResult::new(vec![text], meta))
                }
                Some(Scripted::Empty) | None => Ok(GenerationResult::default()),
                Some(Scripted::Fail(msg)) => Err(LlmError::ConnectionError(msg)),
            }
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    /// Returns the manager plus a handle for inspecting recorded calls.
    pub fn scripted_manager(
        script: Vec<Scripted>,
    ) -> (std::sync::Arc<LlmManager>, std::sync::Arc<ScriptedGenerator>) {
        let generator = std::sync::Arc::new(ScriptedGenerator::new(script));
        let manager = LlmManager::from_generator(Box::new(generator.clone()), 4096);
        (std::sync::Arc::new(manager), generator)
    }
}
