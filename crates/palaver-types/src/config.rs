//! Bot configuration.
//!
//! `BotConfig` represents the TOML config file. Every field that has a
//! sensible default carries one; the two credentials do not and are checked
//! by [`BotConfig::validate`] before the bot starts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default system-role seed message for fresh conversations.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Your answers must use \
the same language as the user messages. You are allowed to use the Internet data.";

/// Configuration validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing config value '{0}'")]
    Missing(&'static str),

    #[error("invalid config value '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Top-level configuration for the bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

impl BotConfig {
    /// Check the configuration before the core starts.
    ///
    /// Credentials must be present; timeouts must be positive; the quota
    /// default must be `-1` (unlimited) or non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.is_empty() {
            return Err(ConfigError::Missing("telegram.token"));
        }
        if self.openai.api_key.is_empty() {
            return Err(ConfigError::Missing("openai.api_key"));
        }
        if self.openai.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "openai.timeout_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.session.stale_after_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "session.stale_after_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.session.quota_default < -1 {
            return Err(ConfigError::Invalid {
                field: "session.quota_default",
                reason: "must be -1 (unlimited) or non-negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Telegram transport settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. Required.
    #[serde(default)]
    pub token: String,
}

/// Completion backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key. Required.
    #[serde(default)]
    pub api_key: String,
    /// Optional organization id sent with every request.
    #[serde(default)]
    pub org_id: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model for chat-style requests (the primary backend).
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model for legacy completion-style requests (the fallback backend).
    #[serde(default = "default_legacy_model")]
    pub legacy_model: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            org_id: None,
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            legacy_model: default_legacy_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_legacy_model() -> String {
    "gpt-3.5-turbo-instruct".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Session store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// SQLite database file path.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "./palaver.db".to_string()
}

/// Quota, staleness and preset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Message ceiling assigned to newly created users; `-1` = unlimited.
    #[serde(default = "default_quota")]
    pub quota_default: i64,
    /// Idle seconds after which a conversation is reset to the seed.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// The system-role seed message for fresh conversations.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quota_default: default_quota(),
            stale_after_secs: default_stale_after_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_quota() -> i64 {
    1000
}

fn default_stale_after_secs() -> u64 {
    3600
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

/// User-visible notice texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    /// Acknowledgement sent when a prompt is accepted.
    #[serde(default = "default_accepted")]
    pub accepted: String,
    /// Shown when the quota ceiling is reached.
    #[serde(default = "default_limit_reached")]
    pub limit_reached: String,
    /// Generic failure notice; raw backend errors are never shown.
    #[serde(default = "default_error")]
    pub error: String,
    /// Confirmation after a `/new` conversation reset.
    #[serde(default = "default_new_chat_created")]
    pub new_chat_created: String,
    /// Shown when a `/new` reset could not be persisted.
    #[serde(default = "default_new_chat_error")]
    pub new_chat_error: String,
    /// Reply to `/help` and `/start`.
    #[serde(default = "default_help")]
    pub help: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            accepted: default_accepted(),
            limit_reached: default_limit_reached(),
            error: default_error(),
            new_chat_created: default_new_chat_created(),
            new_chat_error: default_new_chat_error(),
            help: default_help(),
        }
    }
}

fn default_accepted() -> String {
    "Prompt accepted, thinking...".to_string()
}

fn default_limit_reached() -> String {
    "You have reached your message limit, sorry.".to_string()
}

fn default_error() -> String {
    "Something went wrong, please try again later.".to_string()
}

fn default_new_chat_created() -> String {
    "Started a new conversation.".to_string()
}

fn default_new_chat_error() -> String {
    "Unable to start a new conversation, please try again later.".to_string()
}

fn default_help() -> String {
    "Send me a message and I will answer. /new starts a fresh conversation.".to_string()
}
