use crate::llm::models::GenerationOptions;
use crate::llm::LlmManager;
use crate::pipeline::cleaner::clean_generation_result;
use crate::pipeline::models::{ExamplePair, SqlGeneration, Status};
use crate::pipeline::prompt::{Directive, PromptBuilder};
use crate::pipeline::{PipelineComponents, PipelineError};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const NO_SQL_GENERATED: &str = "no SQL generated";

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert SQL query writer. Given a natural-language request and the database schema provided, write an accurate SQL query.

Requirements:
1. Carefully analyze the intent of the user's question
2. Base the SQL on the provided database schema
3. Make sure the SQL is syntactically valid
4. Return only the SQL statement, with no explanation
5. If the request is ambiguous, produce the most reasonable query rather than refusing

Generate the SQL from the following information:"#;

pub struct SqlGenerationPipeline {
    components: PipelineComponents,
    system_prompt: String,
    options: GenerationOptions,
}

impl SqlGenerationPipeline {
    pub fn new(
        generator: Arc<LlmManager>,
        options: GenerationOptions,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            components: PipelineComponents::new(generator),
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            options,
        }
    }

    pub async fn run(
        &self,
        query: &str,
        db_schemas: &[String],
        sql_samples: &[ExamplePair],
        instructions: &[String],
        reasoning: Option<&str>,
    ) -> SqlGeneration {
        info!("Starting SQL generation");

        match self
            .try_run(query, db_schemas, sql_samples, instructions, reasoning)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("SQL generation failed: {}", e);
                SqlGeneration::failed(e.to_string())
            }
        }
    }

    async fn try_run(
        &self,
        query: &str,
        db_schemas: &[String],
        sql_samples: &[ExamplePair],
        instructions: &[String],
        reasoning: Option<&str>,
    ) -> Result<SqlGeneration, PipelineError> {
        let prompt = PromptBuilder::new(query, Directive::GenerateSql)
            .schemas(db_schemas)
            .examples(sql_samples)
            .instructions(instructions)
            .reasoning(reasoning)
            .build();
        debug!("SQL generation prompt: {}", prompt);

        self.components
            .ensure_fits_context(&self.system_prompt, &prompt)?;

        let result = self
            .components
            .generator
            .invoke(&self.system_prompt, &prompt, &self.options)
            .await;

        if let Some(err) = result.error() {
            return Err(PipelineError::Generation(err.to_string()));
        }

        let Some(raw_sql) = result.replies.first().cloned() else {
            return Ok(SqlGeneration::failed(NO_SQL_GENERATED));
        };

        let sql = clean_generation_result(&raw_sql);
        info!("Generated SQL: {}", sql);

        Ok(SqlGeneration {
            status: Status::Success,
            sql,
            raw_sql,
            error: None,
            meta: result.meta,
        })
    }
}
