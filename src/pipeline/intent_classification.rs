use crate::llm::models::GenerationOptions;
use crate::llm::LlmManager;
use crate::pipeline::extract::extract_classification;
use crate::pipeline::models::{HistoryTurn, IntentClassification};
use crate::pipeline::prompt::{Directive, PromptBuilder};
use crate::pipeline::{PipelineComponents, PipelineError};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const NO_CLASSIFICATION_RESULT: &str = "no classification result";

const MAX_TOKENS: u32 = 500;

const SYSTEM_PROMPT: &str = r#"You are an expert at classifying the intent of database questions. Given the user's question and the database schema, classify the intent as exactly one of the following categories:

1. **TEXT_TO_SQL** - the user wants a SQL query
   - the question asks for specific data, filtering, aggregation or statistics
   - a valid SQL query can be written against the provided schema

2. **GENERAL** - the user asks about the database or data in general
   - what data the database contains
   - how the data could be used or analyzed
   - the question lacks concrete query parameters

3. **MISLEADING_QUERY** - the question is unrelated to the database
   - small talk, greetings
   - questions that have nothing to do with querying data

4. **USER_GUIDE** - the user asks how to use this system
   - how to use the system
   - what features the system offers

Return the classification as JSON:
{
    "intent": "TEXT_TO_SQL|GENERAL|MISLEADING_QUERY|USER_GUIDE",
    "reasoning": "why this category (at most 20 words)",
    "rephrased_question": "the question restated clearly and self-contained"
}"#;

pub struct IntentClassificationPipeline {
    components: PipelineComponents,
    options: GenerationOptions,
    max_histories: usize,
}

impl IntentClassificationPipeline {
    pub fn new(generator: Arc<LlmManager>, temperature: f32, max_histories: usize) -> Self {
        Self {
            components: PipelineComponents::new(generator),
            options: GenerationOptions {
                temperature,
                max_tokens: MAX_TOKENS,
            },
            max_histories,
        }
    }

    /// Classifies the question. Failures degrade to a SQL request instead of
    /// propagating.
    pub async fn run(
        &self,
        query: &str,
        db_schemas: &[String],
        histories: &[HistoryTurn],
    ) -> IntentClassification {
        info!("Starting intent classification");

        match self.try_run(query, db_schemas, histories).await {
            Ok(result) => {
                info!("Intent classified as {}", result.intent);
                result
            }
            Err(e) => {
                error!("Intent classification failed: {}", e);
                IntentClassification::failed(query, e.to_string())
            }
        }
    }

    async fn try_run(
        &self,
        query: &str,
        db_schemas: &[String],
        histories: &[HistoryTurn],
    ) -> Result<IntentClassification, PipelineError> {
        let prompt = PromptBuilder::new(query, Directive::ClassifyIntent)
            .schemas(db_schemas)
            .histories(self.recent_histories(histories))
            .build();
        debug!("Intent classification prompt: {}", prompt);

        self.components.ensure_fits_context(SYSTEM_PROMPT, &prompt)?;

        let result = self
            .components
            .generator
            .invoke(SYSTEM_PROMPT, &prompt, &self.options)
            .await;

        if let Some(err) = result.error() {
            return Err(PipelineError::Generation(err.to_string()));
        }

        let Some(response_text) = result.first_reply() else {
            return Ok(IntentClassification::failed(query, NO_CLASSIFICATION_RESULT));
        };
        debug!("Raw classification reply: {}", response_text);

        Ok(extract_classification(response_text, query))
    }

    fn recent_histories<'a>(&self, histories: &'a [HistoryTurn]) -> &'a [HistoryTurn] {
        let skip = histories.len().saturating_sub(self.max_histories);
        &histories[skip..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{scripted_manager, Scripted};
    use crate::pipeline::extract::DEFAULT_REASONING;
    use crate::pipeline::models::{ExamplePair, Intent, Status};

    #[tokio::test]
    async fn classifies_from_structured_reply() {
        let (manager, generator) = scripted_manager(vec![Scripted::Reply(
            r#"{"intent": "MISLEADING_QUERY", "reasoning": "weather", "rephrased_question": "what's the weather"}"#.into(),
        )]);
        let pipeline = IntentClassificationPipeline::new(manager, 0.1, 5);

        let result = pipeline
            .run("what's the weather", &["CREATE TABLE users(id INT)".to_string()], &[])
            .await;

        assert_eq!(result.status, Status::Success);
        assert_eq!(result.intent, Intent::MisleadingQuery);
        assert_eq!(result.reasoning, "weather");

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system_prompt, SYSTEM_PROMPT);
        assert_eq!(calls[0].options.max_tokens, MAX_TOKENS);
        assert!(calls[0].prompt.contains("CREATE TABLE users(id INT)"));
    }

    #[tokio::test]
    async fn empty_replies_fail_open() {
        let (manager, _) = scripted_manager(vec![Scripted::Empty]);
        let pipeline = IntentClassificationPipeline::new(manager, 0.1, 5);

        let result = pipeline.run("list users", &[], &[]).await;

        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.error.as_deref(), Some(NO_CLASSIFICATION_RESULT));
        assert_eq!(result.intent, Intent::TextToSql);
    }

    #[tokio::test]
    async fn backend_error_fails_with_message() {
        let (manager, _) = scripted_manager(vec![Scripted::Fail("timeout".into())]);
        let pipeline = IntentClassificationPipeline::new(manager, 0.1, 5);

        let result = pipeline.run("list users", &[], &[]).await;

        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.intent, Intent::TextToSql);
        assert!(result.error.unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn plain_text_reply_uses_default_classification() {
        let (manager, _) = scripted_manager(vec![Scripted::Reply("TEXT_TO_SQL".into())]);
        let pipeline = IntentClassificationPipeline::new(manager, 0.1, 5);

        let result = pipeline.run("list users", &[], &[]).await;

        assert_eq!(result.status, Status::Success);
        assert_eq!(result.reasoning, DEFAULT_REASONING);
        assert_eq!(result.rephrased_question, "list users");
    }

    #[tokio::test]
    async fn keeps_only_most_recent_histories() {
        let (manager, generator) = scripted_manager(vec![Scripted::Reply("{}".into())]);
        let pipeline = IntentClassificationPipeline::new(manager, 0.1, 2);
        let histories: Vec<HistoryTurn> = (1..=4)
            .map(|i| ExamplePair::new(format!("question {}", i), format!("SELECT {}", i)))
            .collect();

        pipeline.run("and now?", &[], &histories).await;

        let prompt = &generator.calls()[0].prompt;
        assert!(!prompt.contains("question 1"));
        assert!(!prompt.contains("question 2"));
        assert!(prompt.contains("question 3"));
        assert!(prompt.contains("question 4"));
    }

    #[tokio::test]
    async fn oversized_prompt_fails_without_calling_backend() {
        let (manager, generator) = scripted_manager(vec![]);
        let pipeline = IntentClassificationPipeline::new(manager, 0.1, 5);
        let schemas = vec!["x".repeat(20_000)];

        let result = pipeline.run("list users", &schemas, &[]).await;

        assert_eq!(result.status, Status::Failed);
        assert!(result.error.unwrap().contains("context window"));
        assert!(generator.calls().is_empty());
    }
}
