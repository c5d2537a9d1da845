//! Service error types

use thiserror::Error;

/// Startup and wiring errors for the token pool service.
///
/// Per-request failures (no token within the wait timeout) are turned into
/// HTTP responses by the handlers and never propagate as Rust errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid proxy list: {0}")]
    Proxy(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
