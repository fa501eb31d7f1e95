//! Runtime configuration, read once from the environment at startup.

use std::path::PathBuf;

use crate::error::{PollError, Result};

pub const DEFAULT_TWITTER_API_URL: &str = "https://api.twitter.com";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_CHARACTER_FILE: &str = "characters/eliza.character.json";
pub const DEFAULT_CHARACTER_NAME: &str = "Eliza";

/// Low randomness so the model sticks to the requested JSON shape.
pub const COMPLETION_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone)]
pub struct Config {
    pub twitter_bearer_token: String,
    pub twitter_username: String,
    pub twitter_api_url: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub temperature: f32,
    pub character_file: PathBuf,
    pub character_name: String,
}

impl Config {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(PollError::MissingEnv(key))
        };
        let optional = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            twitter_bearer_token: require("TWITTER_BEARER_TOKEN")?,
            twitter_username: require("TWITTER_USERNAME")?
                .trim()
                .trim_start_matches('@')
                .to_string(),
            openai_api_key: require("OPENAI_API_KEY")?,
            twitter_api_url: optional("TWITTER_API_URL", DEFAULT_TWITTER_API_URL)
                .trim_end_matches('/')
                .to_string(),
            openai_base_url: optional("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            openai_model: optional("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            temperature: COMPLETION_TEMPERATURE,
            character_file: PathBuf::from(optional("CHARACTER_FILE", DEFAULT_CHARACTER_FILE)),
            character_name: optional("CHARACTER_NAME", DEFAULT_CHARACTER_NAME),
        })
    }
}
