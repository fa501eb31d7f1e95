//! Error types for the poll-to-persona pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Every way a pipeline run can fail. All of them are terminal.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("User {username} not found")]
    AccountNotFound { username: String },

    #[error("No tweets found for user {username}")]
    NoPostsFound { username: String },

    #[error("No content in completion response")]
    EmptyResponse,

    #[error("Malformed completion response ({reason}): {raw}")]
    MalformedResponse { reason: String, raw: String },

    #[error("Failed to read character file {path:?}: {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    #[error("Failed to write character file {path:?}: {reason}")]
    ConfigWrite { path: PathBuf, reason: String },

    #[error("Character file {path:?} has an unusable `{field}` field: {reason}")]
    InvalidCharacter {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },

    #[error("{service} API error: {status} - {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl PollError {
    pub(crate) fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PollError>;
