//! Configuration loading and management.
//!
//! Loads Tastemate configuration from `./tastemate.toml` (or
//! `$TASTEMATE_CONFIG_PATH`). Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

// ── Top-level config ────────────────────────────────────────────

/// Top-level Tastemate configuration loaded from TOML.
///
/// Path: `./tastemate.toml` or `$TASTEMATE_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MateConfig {
    /// Language model provider settings (`[llm]`).
    pub llm: LlmConfig,
    /// Cultural recommendation API settings (`[qloo]`).
    pub qloo: QlooSettings,
    /// Telegram delivery settings (`[telegram]`).
    pub telegram: TelegramConfig,
    /// Gmail OAuth application settings (`[mail]`).
    pub mail: MailConfig,
    /// Persistent storage settings (`[store]`).
    pub store: StoreConfig,
    /// Pipeline tuning knobs (`[pipeline]`).
    pub pipeline: PipelineConfig,
    /// Scheduled job settings (`[heartbeat]`).
    pub heartbeat: HeartbeatConfig,
}

impl MateConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$TASTEMATE_CONFIG_PATH` or `./tastemate.toml`.
    /// If the file does not exist, returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: MateConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(MateConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = env("TASTEMATE_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("tastemate.toml")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // LLM.
        if let Some(v) = env("TASTEMATE_OPENAI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = env("TASTEMATE_OPENAI_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env("TASTEMATE_OPENAI_BASE_URL") {
            self.llm.base_url = v;
        }

        // Recommendation API.
        if let Some(v) = env("TASTEMATE_QLOO_API_KEY") {
            self.qloo.api_key = v;
        }
        if let Some(v) = env("TASTEMATE_QLOO_BASE_URL") {
            self.qloo.base_url = v;
        }

        // Telegram.
        if let Some(v) = env("TASTEMATE_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }

        // Mail.
        if let Some(v) = env("TASTEMATE_GOOGLE_CLIENT_ID") {
            self.mail.google_client_id = v;
        }
        if let Some(v) = env("TASTEMATE_GOOGLE_CLIENT_SECRET") {
            self.mail.google_client_secret = v;
        }

        // Store.
        if let Some(v) = env("TASTEMATE_DB_PATH") {
            self.store.db_path = v;
        }

        // Pipeline knobs.
        if let Some(v) = env("TASTEMATE_PIPELINE_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.pipeline.timeout_secs = n,
                Err(_) => tracing::warn!(
                    var = "TASTEMATE_PIPELINE_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("TASTEMATE_INSIGHTS_MAX_ATTEMPTS") {
            match v.parse() {
                Ok(n) => self.pipeline.insights_max_attempts = n,
                Err(_) => tracing::warn!(
                    var = "TASTEMATE_INSIGHTS_MAX_ATTEMPTS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("TASTEMATE_INSIGHTS_BACKOFF_MS") {
            match v.parse() {
                Ok(n) => self.pipeline.insights_backoff_ms = n,
                Err(_) => tracing::warn!(
                    var = "TASTEMATE_INSIGHTS_BACKOFF_MS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }
}

// ── Section configs ─────────────────────────────────────────────

/// Language model provider configuration (`[llm]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key for the chat completions endpoint.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// API base URL (no trailing slash).
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_owned(),
            base_url: "https://api.openai.com".to_owned(),
        }
    }
}

/// Cultural recommendation API configuration (`[qloo]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QlooSettings {
    /// API key sent in the `X-Api-Key` header.
    pub api_key: String,
    /// API base URL (no trailing slash).
    pub base_url: String,
}

impl Default for QlooSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://hackathon.api.qloo.com".to_owned(),
        }
    }
}

/// Telegram delivery configuration (`[telegram]`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token used for outbound sends.
    pub bot_token: String,
}

/// Gmail OAuth application configuration (`[mail]`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Google OAuth client ID.
    pub google_client_id: String,
    /// Google OAuth client secret.
    pub google_client_secret: String,
}

/// Persistent storage configuration (`[store]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path.
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let db_path = directories::ProjectDirs::from("", "", "tastemate")
            .map(|dirs| dirs.data_dir().join("tastemate.db").display().to_string())
            .unwrap_or_else(|| "tastemate.db".to_owned());
        Self { db_path }
    }
}

/// Pipeline tuning knobs (`[pipeline]`).
///
/// The retry count and backoff base are empirically chosen values carried
/// over from the original deployment; they are configuration, not invariants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hard wall-clock budget for one end-to-end pipeline run, in seconds.
    pub timeout_secs: u64,
    /// Total attempts for a rate-limited recommendation fetch.
    pub insights_max_attempts: u32,
    /// Base delay for the exponential rate-limit backoff, in milliseconds.
    pub insights_backoff_ms: u64,
    /// How far back the booking mail search looks, in days.
    pub mail_window_days: i64,
    /// Maximum emails fetched per booking scan.
    pub mail_max_results: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 25,
            insights_max_attempts: 3,
            insights_backoff_ms: 1000,
            mail_window_days: 60,
            mail_max_results: 5,
        }
    }
}

/// Scheduled job configuration (`[heartbeat]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Cron expression for the booking mail scan.
    pub booking_scan_cron: String,
    /// Whether the booking scan job is enabled.
    pub booking_scan_enabled: bool,
    /// Cron expression for the taste digest.
    pub taste_digest_cron: String,
    /// Whether the taste digest job is enabled.
    pub taste_digest_enabled: bool,
    /// Seconds between scheduler ticks.
    pub tick_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            booking_scan_cron: "0 0 9 * * *".to_owned(),
            booking_scan_enabled: true,
            taste_digest_cron: "0 0 18 * * *".to_owned(),
            taste_digest_enabled: true,
            tick_secs: 60,
        }
    }
}
