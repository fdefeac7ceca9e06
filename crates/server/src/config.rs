//! Server configuration
//!
//! Everything is read once at start-up into an explicit [`Config`] value and
//! handed to the constructors; nothing reads the environment afterwards.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Language model settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Select AI access through Oracle REST Data Services
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// e.g. `https://<host>.adb.<region>.oraclecloudapps.com`
    pub ords_base_url: Option<String>,
    pub schema: String,
    pub user: String,
    pub password: String,
    /// Select AI profile name
    pub profile: String,
    pub timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            ords_base_url: None,
            schema: "admin".to_string(),
            user: "ADMIN".to_string(),
            password: String::new(),
            profile: "OCI_GENAI".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Refinement loop bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_iterations: u32,
    /// Extra attempts for a stage whose model call failed or returned nothing
    pub model_retries: u32,
    /// Extra attempts for a gateway call that failed at the transport level
    pub gateway_retries: u32,
    pub judge_enabled: bool,
    /// Characters of SQL and result text kept from the gateway
    pub result_char_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            model_retries: 2,
            gateway_retries: 1,
            judge_enabled: true,
            result_char_limit: 3000,
        }
    }
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub api_key: Option<String>,
    pub cors_origins: Vec<String>,
    pub rate_limit_rps: u32,
    pub anthropic_api_key: Option<String>,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    pub prompt_dir: Option<PathBuf>,
    pub term_dictionary_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm_defaults = LlmConfig::default();
        let db_defaults = DatabaseConfig::default();
        let pipeline_defaults = PipelineConfig::default();

        let max_iterations = parse(&get, "MAX_ITERATIONS", pipeline_defaults.max_iterations)?;
        if max_iterations == 0 {
            return Err(invalid("MAX_ITERATIONS", "0", "must be at least 1"));
        }
        let rate_limit_rps = parse(&get, "RATE_LIMIT_RPS", 100u32)?;
        if rate_limit_rps == 0 {
            return Err(invalid("RATE_LIMIT_RPS", "0", "must be at least 1"));
        }

        Ok(Self {
            bind_address: get("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".into()),
            api_key: get("API_KEY"),
            cors_origins: get("CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| vec!["*".to_string()]),
            rate_limit_rps,
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            llm: LlmConfig {
                base_url: get("ANTHROPIC_BASE_URL").unwrap_or(llm_defaults.base_url),
                model: get("LLM_MODEL").unwrap_or(llm_defaults.model),
                max_tokens: parse(&get, "LLM_MAX_TOKENS", llm_defaults.max_tokens)?,
                temperature: parse(&get, "LLM_TEMPERATURE", llm_defaults.temperature)?,
                timeout: Duration::from_secs(parse(&get, "LLM_TIMEOUT_SECS", 60u64)?),
            },
            database: DatabaseConfig {
                ords_base_url: get("ORDS_BASE_URL"),
                schema: get("DB_SCHEMA").unwrap_or(db_defaults.schema),
                user: get("DB_USER").unwrap_or(db_defaults.user),
                password: get("DB_PASSWORD").unwrap_or(db_defaults.password),
                profile: get("SELECT_AI_PROFILE").unwrap_or(db_defaults.profile),
                timeout: Duration::from_secs(parse(&get, "DB_TIMEOUT_SECS", 120u64)?),
            },
            pipeline: PipelineConfig {
                max_iterations,
                model_retries: parse(&get, "MODEL_RETRIES", pipeline_defaults.model_retries)?,
                gateway_retries: parse(
                    &get,
                    "GATEWAY_RETRIES",
                    pipeline_defaults.gateway_retries,
                )?,
                judge_enabled: parse_bool(&get, "JUDGE_ENABLED", pipeline_defaults.judge_enabled)?,
                result_char_limit: parse(
                    &get,
                    "RESULT_CHAR_LIMIT",
                    pipeline_defaults.result_char_limit,
                )?,
            },
            prompt_dir: get("PROMPT_DIR").map(PathBuf::from),
            term_dictionary_path: get("TERM_DICTIONARY_PATH").map(PathBuf::from),
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, &raw, "expected true or false")),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.pipeline.max_iterations, 5);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert!(config.api_key.is_none());
        assert!(config.database.ords_base_url.is_none());
    }

    #[test]
    fn reads_values() {
        let config = config(&[
            ("MAX_ITERATIONS", "3"),
            ("JUDGE_ENABLED", "false"),
            ("CORS_ORIGINS", "http://a, http://b"),
            ("ORDS_BASE_URL", "https://db.example.com"),
            ("LLM_TEMPERATURE", "0.2"),
        ])
        .unwrap();
        assert_eq!(config.pipeline.max_iterations, 3);
        assert!(!config.pipeline.judge_enabled);
        assert_eq!(config.cors_origins, vec!["http://a", "http://b"]);
        assert_eq!(
            config.database.ords_base_url.as_deref(),
            Some("https://db.example.com")
        );
        assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config(&[("API_KEY", "  "), ("MAX_ITERATIONS", "")]).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.pipeline.max_iterations, 5);
    }

    #[test]
    fn rejects_zero_iterations() {
        let err = config(&[("MAX_ITERATIONS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MAX_ITERATIONS", .. }));
    }

    #[test]
    fn rejects_garbage() {
        assert!(config(&[("MODEL_RETRIES", "two")]).is_err());
        assert!(config(&[("JUDGE_ENABLED", "maybe")]).is_err());
        assert!(config(&[("RATE_LIMIT_RPS", "0")]).is_err());
    }
}
