use crate::config::AppConfig;
use crate::engine::NlSqlEngine;
use std::sync::Arc;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<NlSqlEngine>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, engine: Arc<NlSqlEngine>) -> Self {
        Self {
            config,
            engine,
            startup_time: chrono::Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (chrono::Utc::now() - self.startup_time).num_seconds()
    }
}
