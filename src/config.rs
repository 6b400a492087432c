use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// OpenAI-compatible chat completions endpoint
    Remote,
    Ollama,
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmBackend::Remote => write!(f, "remote"),
            LlmBackend::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window_size: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CoreConfig {
    pub enable_intent_classification: bool,
    /// Number of most recent conversation turns handed to the classifier
    pub max_histories: usize,
    /// Replaces the built-in SQL generation system prompt when set
    pub sql_system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub core: CoreConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Model identifier passed to the LLM backend
    #[arg(short, long)]
    pub model: Option<String>,

    /// Skip intent classification and always generate SQL
    #[arg(long)]
    pub disable_intent_classification: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder();

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-sql-core/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // NLSQL_LLM__API_KEY -> llm.api_key
        config_builder = config_builder.add_source(
            Environment::with_prefix("NLSQL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(model) = &args.model {
            config.llm.model = model.clone();
        }
        if args.disable_intent_classification {
            config.core.enable_intent_classification = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;
        if !(0.0..=2.0).contains(&llm.temperature) {
            return Err(ConfigError::Message(format!(
                "llm.temperature must be between 0 and 2, got {}",
                llm.temperature
            )));
        }
        if llm.max_tokens == 0 {
            return Err(ConfigError::Message("llm.max_tokens must be positive".to_string()));
        }
        if llm.context_window_size == 0 {
            return Err(ConfigError::Message(
                "llm.context_window_size must be positive".to_string(),
            ));
        }
        if llm.backend == LlmBackend::Remote
            && llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(ConfigError::Message(
                "llm.api_key is required for the remote backend".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Remote,
            model: "gpt-3.5-turbo".to_string(),
            api_key: None,
            api_url: None,
            temperature: 0.1,
            max_tokens: 1000,
            context_window_size: 4096,
            timeout_secs: 60,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            enable_intent_classification: true,
            max_histories: 5,
            sql_system_prompt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.llm.backend, LlmBackend::Remote);
        assert_eq!(config.llm.max_tokens, 1000);
        assert_eq!(config.llm.context_window_size, 4096);
        assert!(config.core.enable_intent_classification);
        assert_eq!(config.core.max_histories, 5);
    }

    #[test]
    fn remote_backend_requires_api_key() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.llm.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ollama_backend_needs_no_api_key() {
        let mut config = AppConfig::default();
        config.llm.backend = LlmBackend::Ollama;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut config = AppConfig::default();
        config.llm.backend = LlmBackend::Ollama;
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml = r#"
            [llm]
            backend = "ollama"
            model = "sqlcoder"

            [core]
            enable_intent_classification = false
        "#;
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.llm.backend, LlmBackend::Ollama);
        assert_eq!(config.llm.model, "sqlcoder");
        assert_eq!(config.llm.max_tokens, 1000);
        assert!(!config.core.enable_intent_classification);
        assert_eq!(config.web.host, "127.0.0.1");
    }
}
