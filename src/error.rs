// src/error.rs

//! Unified error handling for the planner application.

use std::fmt;

use thiserror::Error;

/// Result type alias for planner operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// Per-source import failures are not errors at this level: they are
/// reported as [`crate::models::SourceOutcome::Error`] values so a single
/// broken page never fails the whole import.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The page host could not open, read or act on a page
    #[error("Page host error for {context}: {message}")]
    Host { context: String, message: String },

    /// The request bridge is closed or the peer went away
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// A bridged request received no response in time
    #[error("Request {request_id} timed out after {secs}s")]
    RequestTimeout { request_id: String, secs: u64 },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a page host error with context.
    pub fn host(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Host {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a bridge error.
    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge(message.into())
    }
}
