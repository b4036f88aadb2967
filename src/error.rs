//! Error types for Synheart Engage

use thiserror::Error;

/// Errors that can occur while configuring or feeding the engagement tracker
#[derive(Debug, Error)]
pub enum EngageError {
    #[error("Failed to parse page event: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid page event: {0}")]
    InvalidEvent(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Reporting failed: {0}")]
    ReportFailed(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}
