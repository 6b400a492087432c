use crate::pipeline::PipelineError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Classified purpose of a user question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    #[default]
    TextToSql,
    General,
    MisleadingQuery,
    UserGuide,
}

impl Intent {
    /// Maps a model-supplied label onto an intent. Only the exact labels are
    /// recognised; anything else is treated as a SQL request.
    pub fn from_label(label: &str) -> Self {
        match label {
            "GENERAL" => Intent::General,
            "MISLEADING_QUERY" => Intent::MisleadingQuery,
            "USER_GUIDE" => Intent::UserGuide,
            _ => Intent::TextToSql,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::TextToSql => "TEXT_TO_SQL",
            Intent::General => "GENERAL",
            Intent::MisleadingQuery => "MISLEADING_QUERY",
            Intent::UserGuide => "USER_GUIDE",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Intent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Intent::from_label(&label))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
    Disabled,
}

/// A question/SQL pair, used both for few-shot examples and conversation turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamplePair {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub sql: String,
}

impl ExamplePair {
    #[cfg(test)]
    pub fn new(question: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            sql: sql.into(),
        }
    }
}

pub type HistoryTurn = ExamplePair;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub db_schemas: Vec<String>,
    #[serde(default)]
    pub sql_samples: Vec<ExamplePair>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub histories: Vec<HistoryTurn>,
    #[serde(default = "default_true")]
    pub enable_intent_classification: bool,
    /// Optional reasoning plan handed to SQL generation
    #[serde(default)]
    pub sql_generation_reasoning: Option<String>,
}

impl QueryRequest {
    #[cfg(test)]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            project_id: None,
            db_schemas: Vec::new(),
            sql_samples: Vec::new(),
            instructions: Vec::new(),
            histories: Vec::new(),
            enable_intent_classification: true,
            sql_generation_reasoning: None,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_query(&self.query)
    }
}

pub fn validate_query(query: &str) -> Result<(), PipelineError> {
    if query.trim().is_empty() {
        return Err(PipelineError::InvalidRequest(
            "query must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: Status,
    pub query_type: Intent,
    pub intent_reasoning: String,
    pub rephrased_question: String,
    pub sql: String,
    pub raw_sql: String,
    pub error: String,
    pub meta: Map<String, Value>,
}

impl QueryResponse {
    pub fn new(query: &str) -> Self {
        Self {
            status: Status::Success,
            query_type: Intent::TextToSql,
            intent_reasoning: String::new(),
            rephrased_question: query.to_string(),
            sql: String::new(),
            raw_sql: String::new(),
            error: String::new(),
            meta: Map::new(),
        }
    }

    /// Marks the response failed, keeping everything set so far.
    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.status = Status::Failed;
        self.error = if error.trim().is_empty() {
            "query processing failed".to_string()
        } else {
            error
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassification {
    pub status: Status,
    pub intent: Intent,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub rephrased_question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the intent is a fallback rather than the model's answer
    #[serde(default)]
    pub degraded: bool,
}

impl IntentClassification {
    pub fn failed(query: &str, error: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            intent: Intent::TextToSql,
            reasoning: String::new(),
            rephrased_question: query.to_string(),
            raw_response: None,
            error: Some(error.into()),
            degraded: true,
        }
    }

    pub fn disabled(query: &str) -> Self {
        Self {
            status: Status::Disabled,
            intent: Intent::TextToSql,
            reasoning: "intent classification is disabled".to_string(),
            rephrased_question: query.to_string(),
            raw_response: None,
            error: None,
            degraded: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlGeneration {
    pub status: Status,
    pub sql: String,
    #[serde(default)]
    pub raw_sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl SqlGeneration {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            sql: String::new(),
            raw_sql: String::new(),
            error: Some(error.into()),
            meta: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_labels_collapse_to_text_to_sql() {
        assert_eq!(Intent::from_label("GENERAL"), Intent::General);
        assert_eq!(Intent::from_label("USER_GUIDE"), Intent::UserGuide);
        assert_eq!(Intent::from_label(" user_guide "), Intent::TextToSql);
        assert_eq!(Intent::from_label("general"), Intent::TextToSql);
        assert_eq!(Intent::from_label("CHITCHAT"), Intent::TextToSql);
        assert_eq!(Intent::from_label(""), Intent::TextToSql);

        let intent: Intent = serde_json::from_str("\"SOMETHING_ELSE\"").unwrap();
        assert_eq!(intent, Intent::TextToSql);
    }

    #[test]
    fn intent_serializes_as_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&Intent::MisleadingQuery).unwrap(),
            "\"MISLEADING_QUERY\""
        );
        assert_eq!(Intent::TextToSql.to_string(), "TEXT_TO_SQL");
    }

    #[test]
    fn request_without_optional_lists_deserializes_to_empty() {
        let request: QueryRequest = serde_json::from_str(r#"{"query": "list all users"}"#).unwrap();

        assert!(request.db_schemas.is_empty());
        assert!(request.sql_samples.is_empty());
        assert!(request.instructions.is_empty());
        assert!(request.histories.is_empty());
        assert!(request.enable_intent_classification);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn blank_query_fails_validation() {
        assert!(QueryRequest::new("   ").validate().is_err());
    }

    #[test]
    fn response_is_seeded_for_sql_generation() {
        let response = QueryResponse::new("list all users");
        assert_eq!(response.status, Status::Success);
        assert_eq!(response.query_type, Intent::TextToSql);
        assert_eq!(response.rephrased_question, "list all users");
        assert!(response.meta.is_empty());
    }

    #[test]
    fn failing_a_response_always_leaves_an_error() {
        let mut response = QueryResponse::new("q");
        response.fail("");
        assert_eq!(response.status, Status::Failed);
        assert!(!response.error.is_empty());
    }
}
