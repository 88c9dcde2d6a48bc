//! Configuration management for `FlyTicker`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings. Invalid
//! configuration is fatal before any location is evaluated.

use crate::FlyTickerError;
use crate::enrichment::{EnrichmentSettings, FlightWindow};
use crate::ranking::{PromptTemplates, RankingOptions, RetryPolicy};
use crate::safety::SafetyLimits;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlyTickerConfig {
    /// Reasoning service connection
    pub llm: LlmConfig,
    /// Backoff for transient reasoning-service failures
    pub retry: RetryPolicy,
    /// Clarification budget, deadline and concurrency
    pub ranking: RankingConfig,
    /// Hard safety limits
    pub safety: SafetyLimits,
    /// Daily flight hours and forecast horizon
    pub flight_window: FlightWindow,
    pub enrichment: EnrichmentSettings,
    pub prompts: PromptTemplates,
    pub logging: LoggingConfig,
}

/// OpenAI-compatible chat-completions settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Falls back to `OPENAI_API_KEY` when unset
    pub api_key: Option<String>,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
    /// Request `response_format = json_object` for models that support it
    #[serde(default = "default_true")]
    pub json_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Reasoning requests per location, the initial one included
    pub max_rounds: u32,
    /// Deadline for ranking one location
    pub evaluation_timeout_seconds: u64,
    /// Locations evaluated concurrently
    pub max_concurrency: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            evaluation_timeout_seconds: 120,
            max_concurrency: 4,
        }
    }
}

impl RankingConfig {
    #[must_use]
    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation_timeout_seconds)
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_temperature() -> f32 {
    0.3
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_llm_temperature(),
            timeout_seconds: default_llm_timeout(),
            json_mode: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl FlyTickerConfig {
    /// Load configuration from file and environment variables
    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let explicit = config_path.is_some();
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if explicit && !config_file.exists() {
            return Err(FlyTickerError::config(format!(
                "Configuration file not found: {}",
                config_file.display()
            ))
            .into());
        }

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // FLYTICKER_LLM__MODEL overrides llm.model
        builder = builder.add_source(
            Environment::with_prefix("FLYTICKER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| format!("Failed to build configuration from {}", config_file.display()))?;

        let mut config: FlyTickerConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("flyticker").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        self.fill_defaults(std::env::var("OPENAI_API_KEY").ok());
    }

    fn fill_defaults(&mut self, env_api_key: Option<String>) {
        if self.llm.base_url.is_empty() {
            self.llm.base_url = default_llm_base_url();
        }
        if self.llm.model.is_empty() {
            self.llm.model = default_llm_model();
        }
        if self.llm.timeout_seconds == 0 {
            self.llm.timeout_seconds = default_llm_timeout();
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = env_api_key.filter(|key| !key.trim().is_empty());
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_llm()?;
        self.validate_ranking()?;
        self.validate_string_values()?;
        self.safety.validate()?;
        self.flight_window.validate()?;
        self.retry.validate()?;
        self.prompts.validate()?;
        Ok(())
    }

    fn validate_llm(&self) -> Result<()> {
        if let Some(api_key) = &self.llm.api_key {
            if api_key.trim().is_empty() {
                return Err(FlyTickerError::config(
                    "LLM API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(FlyTickerError::config("LLM temperature must be between 0.0 and 2.0").into());
        }

        if self.llm.timeout_seconds > 600 {
            return Err(FlyTickerError::config("LLM request timeout cannot exceed 600 seconds").into());
        }

        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://") {
            return Err(FlyTickerError::config(
                "LLM base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        Ok(())
    }

    fn validate_ranking(&self) -> Result<()> {
        if self.ranking.max_rounds == 0 {
            return Err(FlyTickerError::config("ranking.max_rounds must be at least 1").into());
        }
        if self.ranking.max_rounds > 10 {
            return Err(FlyTickerError::config("ranking.max_rounds cannot exceed 10").into());
        }
        if self.ranking.max_concurrency == 0 {
            return Err(FlyTickerError::config("ranking.max_concurrency must be at least 1").into());
        }
        if self.ranking.evaluation_timeout_seconds == 0 {
            return Err(FlyTickerError::config(
                "ranking.evaluation_timeout_seconds must be at least 1",
            )
            .into());
        }

        let tolerance = self.enrichment.default_sector_tolerance_deg;
        if !(0.0..=180.0).contains(&tolerance) {
            return Err(FlyTickerError::config(format!(
                "enrichment.default_sector_tolerance_deg must be between 0 and 180, got {tolerance}"
            ))
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(FlyTickerError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(FlyTickerError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        Ok(())
    }

    /// Ranking-stage parameters derived from this configuration
    #[must_use]
    pub fn ranking_options(&self) -> RankingOptions {
        RankingOptions {
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            max_rounds: self.ranking.max_rounds,
            retry: self.retry.clone(),
            templates: self.prompts.clone(),
        }
    }
}
