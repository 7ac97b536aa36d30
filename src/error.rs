// src/error.rs

//! Unified error handling for the course monitor.

use std::fmt;

use thiserror::Error;

use crate::services::ChannelError;

/// Result type alias for monitor operations.
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

    /// Login rejected or the portal is unreachable
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Page or resource unreachable, or a non-success status
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Artifact download produced nothing usable
    #[error("Download failed for {url}: {message}")]
    Download { url: String, message: String },

    /// The messaging channel refused a send
    #[error("Delivery failed: {0}")]
    Delivery(#[from] ChannelError),

    /// A persisted document could not be read or written
    #[error("Persistence error for {document}: {message}")]
    Persistence { document: String, message: String },
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

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a fetch error with the offending URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a download error with the offending URL.
    pub fn download(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Download {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error for a named document.
    pub fn persistence(document: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Persistence {
            document: document.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error means the portal rejected our credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
