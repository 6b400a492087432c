use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod engine;
mod llm;
mod pipeline;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::engine::NlSqlEngine;
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(&args.log_level, args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Initializing LLM manager with backend: {} (model: {})",
        config.llm.backend, config.llm.model
    );
    let llm_manager = Arc::new(LlmManager::new(&config.llm)?);

    let engine = Arc::new(NlSqlEngine::new(llm_manager, &config.llm, &config.core));
    let app_state = Arc::new(AppState::new(config.clone(), engine));

    // Start the web server
    info!("Starting server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
