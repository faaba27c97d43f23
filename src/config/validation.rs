//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Decode key material and header values up front
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::auth::AuthSettings;
use crate::config::schema::{AuthMode, ServerConfig};
use crate::http::middleware::cors::CorsHeaders;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("auth: {0}")]
    Auth(String),

    #[error("cors: {0}")]
    Cors(String),

    #[error("observability.log_level: {0}")]
    LogLevel(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "security.max_body_size" });
    }

    if let Err(e) = AuthSettings::from_config(&config.auth) {
        errors.push(ValidationError::Auth(e.to_string()));
    }

    if let Err(e) = CorsHeaders::from_config(&config.cors) {
        errors.push(ValidationError::Cors(e.to_string()));
    }

    if let Err(e) = config
        .observability
        .log_level
        .parse::<tracing_subscriber::EnvFilter>()
    {
        errors.push(ValidationError::LogLevel(e.to_string()));
    }

    if errors.is_empty() {
        warn_on_locked_writes(config);
        Ok(())
    } else {
        Err(errors)
    }
}

/// A mode with no matching credentials is valid but rejects every write.
fn warn_on_locked_writes(config: &ServerConfig) {
    let auth = &config.auth;
    let locked = match auth.mode {
        AuthMode::Bearer => auth.bearer_tokens.is_empty(),
        AuthMode::Pki => auth.pki_keys.is_empty(),
        AuthMode::Any => auth.bearer_tokens.is_empty() && auth.pki_keys.is_empty(),
    };
    if locked {
        tracing::warn!(mode = ?auth.mode, "No credentials configured; profile writes will be rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PkiKeyConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.auth.pki_keys.push(PkiKeyConfig {
            key_id: "k1".into(),
            public_key: "!!not base64!!".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero { field: "timeouts.request_secs" }));
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_bad_cors_header_value() {
        let mut config = ServerConfig::default();
        config.cors.allow_origin = "bad\nvalue".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::Cors(_)));
    }
}
