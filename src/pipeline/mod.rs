pub mod cleaner;
pub mod extract;
pub mod intent_classification;
pub mod models;
pub mod prompt;
pub mod sql_generation;

use crate::llm::LlmManager;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum PipelineError {
    InvalidRequest(String),
    PromptTooLarge { estimated: usize, limit: usize },
    Generation(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            PipelineError::PromptTooLarge { estimated, limit } => write!(
                f,
                "prompt of ~{} tokens exceeds the context window of {} tokens",
                estimated, limit
            ),
            PipelineError::Generation(msg) => write!(f, "text generation failed: {}", msg),
        }
    }
}

impl Error for PipelineError {}

/// Capabilities a stage calls through. Read-only once the stage is built.
#[derive(Clone)]
pub struct PipelineComponents {
    pub generator: Arc<LlmManager>,
}

impl PipelineComponents {
    pub fn new(generator: Arc<LlmManager>) -> Self {
        Self { generator }
    }

    pub fn ensure_fits_context(&self, system_prompt: &str, prompt: &str) -> Result<(), PipelineError> {
        let estimated =
            self.generator.estimate_tokens(system_prompt) + self.generator.estimate_tokens(prompt);
        let limit = self.generator.context_window_size();
        if estimated > limit {
            return Err(PipelineError::PromptTooLarge { estimated, limit });
        }
        Ok(())
    }
}
