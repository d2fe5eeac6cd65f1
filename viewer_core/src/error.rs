//! Error types for the model viewer

use thiserror::Error;

/// Errors surfaced by loading, configuration and capture
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to import {format} model: {message}")]
    Import {
        format: &'static str,
        message: String,
    },

    #[error("model contains no renderable geometry: {0}")]
    EmptyModel(String),

    #[error("invalid viewer configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("screenshot failed: {0}")]
    Screenshot(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl ViewerError {
    pub fn import(format: &'static str, message: impl ToString) -> Self {
        Self::Import {
            format,
            message: message.to_string(),
        }
    }
}

/// Result type alias for viewer operations
pub type Result<T> = std::result::Result<T, ViewerError>;
