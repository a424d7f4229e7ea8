use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PgAssistConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

/// Chat model settings. Prices are USD per 1K tokens and only feed the usage log.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub temperature: f32,
    pub base_url: String,
    pub prompt_cost_per_1k: f64,
    pub completion_cost_per_1k: f64,
    pub export_api_key_env: bool,
    pub request_timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            base_url: "https://api.openai.com/v1".to_string(),
            prompt_cost_per_1k: 0.0005,
            completion_cost_per_1k: 0.0015,
            export_api_key_env: true,
            request_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChainConfig {
    pub top_k: u32,
    pub use_query_checker: bool,
    pub return_intermediate_steps: bool,
    pub sample_rows_in_table_info: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            top_k: 100,
            use_query_checker: true,
            return_intermediate_steps: true,
            sample_rows_in_table_info: 3,
        }
    }
}

/// Schema to introspect plus the defaults pre-filled in the "Local" form.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub schema: String,
    pub default_host: String,
    pub default_port: String,
    pub default_user: String,
    pub default_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            default_host: "localhost".to_string(),
            default_port: "5432".to_string(),
            default_user: "postgres".to_string(),
            default_name: "testing_3".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_minutes: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 60,
            sweep_interval_seconds: 60,
        }
    }
}

impl PgAssistConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;
        s.try_deserialize()
    }
}
