use interview_core::{outcome::OutcomePolicy, retry::RetryPolicy};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported completion providers. Both are reached through an
/// OpenAI-compatible API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

impl Provider {
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1/",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// Per-call interview limits read by every session.
#[derive(Clone, Debug, PartialEq)]
pub struct InterviewSettings {
    pub max_duration_minutes: u64,
    pub warning_minutes: u64,
    pub retry: RetryPolicy,
    pub max_reminders: u32,
    pub history_cap: usize,
    pub full_check_after_turns: usize,
    pub outcome: OutcomePolicy,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            max_duration_minutes: 15,
            warning_minutes: 5,
            retry: RetryPolicy::default(),
            max_reminders: 2,
            history_cap: 40,
            full_check_after_turns: 4,
            outcome: OutcomePolicy::default(),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub compatibility_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub interview: InterviewSettings,
}

/// Reads an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            _ => Provider::OpenAI,
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let compatibility_model =
            std::env::var("COMPATIBILITY_MODEL").unwrap_or_else(|_| chat_model.clone());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
        }

        let defaults = InterviewSettings::default();
        let interview = InterviewSettings {
            max_duration_minutes: parse_var(
                "MAX_INTERVIEW_MINUTES",
                defaults.max_duration_minutes,
            )?,
            warning_minutes: parse_var("WARNING_MINUTES", defaults.warning_minutes)?,
            retry: RetryPolicy {
                max_attempts: parse_var("MAX_RETRIES", defaults.retry.max_attempts)?,
                base_delay: Duration::from_millis(parse_var("RETRY_BASE_DELAY_MS", 500u64)?),
                max_delay: Duration::from_millis(parse_var("RETRY_MAX_DELAY_MS", 4000u64)?),
            },
            max_reminders: parse_var("MAX_REMINDERS", defaults.max_reminders)?,
            history_cap: parse_var("HISTORY_CAP", defaults.history_cap)?,
            full_check_after_turns: parse_var(
                "FULL_CHECK_AFTER_TURNS",
                defaults.full_check_after_turns,
            )?,
            outcome: OutcomePolicy {
                min_duration: Duration::from_secs(parse_var("MIN_CALL_SECONDS", 60u64)?),
                min_exchanges: parse_var("MIN_CALL_EXCHANGES", defaults.outcome.min_exchanges)?,
            },
        };

        Ok(Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            compatibility_model,
            log_level,
            prompts_path,
            interview,
        })
    }

    /// The API key for the configured provider.
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        }
    }
}
