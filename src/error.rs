// src/error.rs

//! Unified error handling for the crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

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

    /// Navigation failed or timed out; retryable
    #[error("Navigation error for {url}: {message}")]
    Navigation { url: String, message: String },

    /// The page was replaced by a challenge, a foreign locale or a non-search page
    #[error("Diverted from {url}: {reason}")]
    Diverted { url: String, reason: String },

    /// A strategy could not parse its payload
    #[error("Malformed payload in {strategy}: {message}")]
    MalformedPayload { strategy: String, message: String },

    /// Dataset or key-value store write failed
    #[error("Storage error: {0}")]
    Storage(String),
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

    /// Create a navigation error for a URL.
    pub fn navigation(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a diversion error for a URL.
    pub fn diverted(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Diverted {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a malformed payload error for a strategy.
    pub fn malformed(strategy: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedPayload {
            strategy: strategy.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Whether a fresh navigation may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. } | Self::Diverted { .. } | Self::Http(_)
        )
    }
}
