//! Query orchestration: optional intent classification followed by SQL
//! generation when the question turns out to be a SQL request.

use crate::config::{CoreConfig, LlmConfig};
use crate::llm::models::GenerationOptions;
use crate::llm::LlmManager;
use crate::pipeline::intent_classification::IntentClassificationPipeline;
use crate::pipeline::models::{
    validate_query, ExamplePair, HistoryTurn, Intent, IntentClassification, QueryRequest,
    QueryResponse, SqlGeneration, Status,
};
use crate::pipeline::sql_generation::SqlGenerationPipeline;
use crate::pipeline::PipelineError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const GENERAL_MESSAGE: &str = "This is a general question about the data. Please ask a more specific question so a SQL query can be generated.";
pub const MISLEADING_QUERY_MESSAGE: &str = "Sorry, your question does not seem to be about the data. Please ask a question related to the database.";
pub const USER_GUIDE_MESSAGE: &str = "This is a question about using the system. Please consult the user guide or ask a concrete data question.";
pub const UNKNOWN_QUERY_TYPE_MESSAGE: &str = "Unknown query type.";

/// Explanation returned in `meta["message"]` when no SQL is generated.
pub fn non_sql_message(intent: Intent) -> &'static str {
    match intent {
        Intent::General => GENERAL_MESSAGE,
        Intent::MisleadingQuery => MISLEADING_QUERY_MESSAGE,
        Intent::UserGuide => USER_GUIDE_MESSAGE,
        _ => UNKNOWN_QUERY_TYPE_MESSAGE,
    }
}

pub struct NlSqlEngine {
    generator: Arc<LlmManager>,
    intent_classification: Option<IntentClassificationPipeline>,
    sql_generation: SqlGenerationPipeline,
}

impl NlSqlEngine {
    pub fn new(generator: Arc<LlmManager>, llm: &LlmConfig, core: &CoreConfig) -> Self {
        let intent_classification = core.enable_intent_classification.then(|| {
            IntentClassificationPipeline::new(
                Arc::clone(&generator),
                llm.temperature,
                core.max_histories,
            )
        });

        let sql_generation = SqlGenerationPipeline::new(
            Arc::clone(&generator),
            GenerationOptions {
                temperature: llm.temperature,
                max_tokens: llm.max_tokens,
            },
            core.sql_system_prompt.clone(),
        );

        info!(
            "Engine ready (model: {}, intent classification: {})",
            generator.model(),
            intent_classification.is_some()
        );

        Self {
            generator,
            intent_classification,
            sql_generation,
        }
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    pub fn intent_classification_enabled(&self) -> bool {
        self.intent_classification.is_some()
    }

    /// Runs the full pipeline. Always returns a well-formed response; a
    /// failed response carries a non-empty error.
    pub async fn query(&self, request: &QueryRequest) -> QueryResponse {
        info!("Processing query: {}", request.query);

        let mut response = QueryResponse::new(&request.query);
        if let Err(e) = self.run_query(request, &mut response).await {
            error!("Query processing failed: {}", e);
            response.fail(e.to_string());
        }
        response
    }

    async fn run_query(
        &self,
        request: &QueryRequest,
        response: &mut QueryResponse,
    ) -> Result<(), PipelineError> {
        request.validate()?;

        let classifier = self
            .intent_classification
            .as_ref()
            .filter(|_| request.enable_intent_classification);

        if let Some(pipeline) = classifier {
            let intent = pipeline
                .run(&request.query, &request.db_schemas, &request.histories)
                .await;

            if intent.degraded {
                response
                    .meta
                    .insert("classification_degraded".to_string(), Value::Bool(true));
            }

            match intent.status {
                Status::Success => {
                    response.query_type = intent.intent;
                    response.intent_reasoning = intent.reasoning;
                    response.rephrased_question = intent.rephrased_question;
                    info!("Intent classification result: {}", response.query_type);
                }
                _ => warn!(
                    "Intent classification unavailable, generating SQL: {}",
                    intent.error.as_deref().unwrap_or("unknown error")
                ),
            }

            if response.query_type != Intent::TextToSql {
                response.sql.clear();
                response.meta.insert(
                    "message".to_string(),
                    Value::String(non_sql_message(response.query_type).to_string()),
                );
                return Ok(());
            }
        }

        let generated = self
            .sql_generation
            .run(
                &response.rephrased_question,
                &request.db_schemas,
                &request.sql_samples,
                &request.instructions,
                request.sql_generation_reasoning.as_deref(),
            )
            .await;

        match generated.status {
            Status::Success => {
                response.sql = generated.sql;
                response.raw_sql = generated.raw_sql;
                response.meta.extend(generated.meta);
            }
            _ => {
                let message = generated
                    .error
                    .unwrap_or_else(|| "SQL generation failed".to_string());
                error!("SQL generation failed: {}", message);
                response.fail(message);
            }
        }

        Ok(())
    }

    /// SQL generation without intent classification.
    pub async fn generate_sql(
        &self,
        query: &str,
        db_schemas: &[String],
        sql_samples: &[ExamplePair],
        instructions: &[String],
        reasoning: Option<&str>,
    ) -> SqlGeneration {
        if let Err(e) = validate_query(query) {
            return SqlGeneration::failed(e.to_string());
        }
        self.sql_generation
            .run(query, db_schemas, sql_samples, instructions, reasoning)
            .await
    }

    /// Intent classification only; reports `disabled` when the engine was
    /// built without a classifier.
    pub async fn classify_intent(
        &self,
        query: &str,
        db_schemas: &[String],
        histories: &[HistoryTurn],
    ) -> IntentClassification {
        let Some(pipeline) = &self.intent_classification else {
            return IntentClassification::disabled(query);
        };
        if let Err(e) = validate_query(query) {
            return IntentClassification::failed(query, e.to_string());
        }
        pipeline.run(query, db_schemas, histories).await
    }
}
