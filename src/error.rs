//! Startup error type.

use axum::http::header::InvalidHeaderValue;
use thiserror::Error;

use crate::auth::AuthConfigError;
use crate::config::ConfigError;
use crate::profile::StoreError;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Profile store error: {0}")]
    Store(#[from] StoreError),

    #[error("Auth configuration error: {0}")]
    Auth(#[from] AuthConfigError),

    #[error("Invalid CORS header value: {0}")]
    Cors(#[from] InvalidHeaderValue),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
