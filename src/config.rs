use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides `[telegram] bot_token`
pub const TOKEN_ENV: &str = "TELOXIDE_TOKEN";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Load the config file, letting `TELOXIDE_TOKEN` override the token.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_token(path, std::env::var(TOKEN_ENV).ok())
    }

    /// Load with an explicit token override. A missing file is fine as long as
    /// the override supplies the token.
    pub fn load_with_token(path: &Path, token_override: Option<String>) -> Result<Self> {
        let token_override = token_override.filter(|t| !t.trim().is_empty());

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Invalid config: {}", path.display()))?
        } else if token_override.is_some() {
            Config::default()
        } else {
            bail!(
                "Config file {} not found and {} is not set",
                path.display(),
                TOKEN_ENV
            );
        };

        if let Some(token) = token_override {
            config.telegram.bot_token = token;
        }

        if config.telegram.bot_token.trim().is_empty() {
            bail!(
                "No bot token configured: set [telegram] bot_token or {}",
                TOKEN_ENV
            );
        }

        Ok(config)
    }
}
