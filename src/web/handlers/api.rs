use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::pipeline::models::{
    validate_query, ExamplePair, HistoryTurn, IntentClassification, QueryRequest, QueryResponse,
    SqlGeneration,
};
use crate::web::state::AppState;

// Request types

#[derive(Debug, Deserialize)]
pub struct SqlGenerationRequest {
    pub query: String,
    #[serde(default)]
    pub db_schemas: Vec<String>,
    #[serde(default)]
    pub sql_samples: Vec<ExamplePair>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub sql_generation_reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IntentClassificationRequest {
    pub query: String,
    #[serde(default)]
    pub db_schemas: Vec<String>,
    #[serde(default)]
    pub histories: Vec<HistoryTurn>,
}

// System status

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub backend: String,
    pub model: String,
    pub intent_classification: bool,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn bad_request(query: &str) -> Result<(), (StatusCode, String)> {
    validate_query(query).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

// API Implementations

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Natural language to SQL service",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "model": state.engine.model(),
        "intent_classification": state.engine.intent_classification_enabled(),
    }))
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> ApiResult<QueryResponse> {
    bad_request(&payload.query)?;
    debug!("NL-query: {}", payload.query);

    let response = state.engine.query(&payload).await;
    info!(
        "Query finished with status {:?} as {}",
        response.status, response.query_type
    );
    Ok(Json(response))
}

pub async fn generate_sql(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SqlGenerationRequest>,
) -> ApiResult<SqlGeneration> {
    bad_request(&payload.query)?;
    debug!("Direct SQL generation: {}", payload.query);

    let result = state
        .engine
        .generate_sql(
            &payload.query,
            &payload.db_schemas,
            &payload.sql_samples,
            &payload.instructions,
            payload.sql_generation_reasoning.as_deref(),
        )
        .await;
    Ok(Json(result))
}

pub async fn classify_intent(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IntentClassificationRequest>,
) -> ApiResult<IntentClassification> {
    bad_request(&payload.query)?;
    debug!("Direct intent classification: {}", payload.query);

    let result = state
        .engine
        .classify_intent(&payload.query, &payload.db_schemas, &payload.histories)
        .await;
    Ok(Json(result))
}

pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        backend: state.config.llm.backend.to_string(),
        model: state.engine.model().to_string(),
        intent_classification: state.engine.intent_classification_enabled(),
    })
}
