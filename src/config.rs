use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::max::types::TextFormat;
use crate::max::AuthError;

/// Environment variable holding the bot token
pub const TOKEN_ENV: &str = "TOKEN";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub max: MaxConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MaxConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Server-side long-poll timeout in seconds
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u32,
    #[serde(default = "default_poll_limit")]
    pub poll_limit: u32,
    /// Update types to subscribe to; empty means all
    #[serde(default)]
    pub update_types: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplyConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default)]
    pub notify: Option<bool>,
    #[serde(default)]
    pub format: Option<TextFormat>,
}

impl Default for MaxConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
            poll_limit: default_poll_limit(),
            update_types: Vec::new(),
        }
    }
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            notify: None,
            format: None,
        }
    }
}

fn default_base_url() -> String {
    "https://platform-api.max.ru".to_string()
}

fn default_poll_timeout_secs() -> u32 {
    30
}

fn default_poll_limit() -> u32 {
    100
}

fn default_greeting() -> String {
    "Hello! I received your message! 🎉".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load the config file if present. A missing file falls back to defaults
    /// unless the path was given explicitly on the command line.
    pub fn load_or_default(path: &Path, explicit: bool) -> Result<Self> {
        if !explicit && !path.exists() {
            info!(
                "No config file at {}, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

/// Raw value of the token variable, if set.
pub fn token_env() -> Option<String> {
    std::env::var(TOKEN_ENV).ok()
}

/// Validate a token taken from the environment; blank counts as missing.
pub fn token_from(value: Option<String>) -> std::result::Result<String, AuthError> {
    match value {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AuthError::MissingToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.max.base_url, "https://platform-api.max.ru");
        assert_eq!(config.max.poll_timeout_secs, 30);
        assert_eq!(config.max.poll_limit, 100);
        assert!(config.max.update_types.is_empty());
        assert_eq!(config.reply.greeting, "Hello! I received your message! 🎉");
        assert_eq!(config.reply.notify, None);
        assert_eq!(config.reply.format, None);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [max]
            poll_timeout_secs = 5
            update_types = ["message_created"]

            [reply]
            notify = false
            format = "markdown"
            "#,
        )
        .unwrap();
        assert_eq!(config.max.poll_timeout_secs, 5);
        assert_eq!(config.max.poll_limit, 100);
        assert_eq!(config.max.update_types, vec!["message_created"]);
        assert_eq!(config.reply.notify, Some(false));
        assert_eq!(config.reply.format, Some(TextFormat::Markdown));
        assert_eq!(config.reply.greeting, "Hello! I received your message! 🎉");
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(Config::parse("[max\nbase_url = ").is_err());
    }

    #[test]
    fn test_missing_default_file_falls_back() {
        let path = Path::new("/nonexistent/max-greeter/config.toml");
        let config = Config::load_or_default(path, false).unwrap();
        assert_eq!(config.max.poll_limit, 100);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = Path::new("/nonexistent/max-greeter/config.toml");
        assert!(Config::load_or_default(path, true).is_err());
    }

    #[test]
    fn test_token_absent_or_blank() {
        assert!(matches!(token_from(None), Err(AuthError::MissingToken)));
        assert!(matches!(
            token_from(Some("   ".to_string())),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn test_token_is_trimmed() {
        assert_eq!(token_from(Some(" abc123\n".to_string())).unwrap(), "abc123");
    }
}
