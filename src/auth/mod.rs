//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! PUT/DELETE /profile
//!     → require_auth (pick scheme from auth.mode)
//!         → bearer.rs  Authorization: Bearer <token>
//!         → pki.rs     Auth: <key-id> <signature> + X-Auth-Timestamp
//!     → Principal inserted into request extensions
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Settings are compiled once per config load and swapped atomically
//! - Every failure is a 401 with a challenge; the reason is only logged

pub mod bearer;
pub mod pki;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::VerifyingKey;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMode};
use crate::observability::metrics;

pub use bearer::bearer_auth;
pub use pki::{pki_auth, sign_request, signing_message, AUTH_HEADER, TIMESTAMP_HEADER};

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Holder of a configured bearer token.
    Bearer,
    /// Holder of the private half of a configured key.
    Key { key_id: String },
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Bearer => write!(f, "bearer"),
            Principal::Key { key_id } => write!(f, "key:{}", key_id),
        }
    }
}

/// Credential scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Bearer,
    Pki,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Bearer => "bearer",
            Scheme::Pki => "pki",
        }
    }

    fn challenge(self) -> &'static str {
        match self {
            Scheme::Bearer => "Bearer realm=\"webid\"",
            Scheme::Pki => "Signature realm=\"webid\"",
        }
    }
}

/// Why a request was not authenticated.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing {header} header")]
    Missing { scheme: Scheme, header: &'static str },

    #[error("{reason}")]
    Rejected { scheme: Scheme, reason: String },

    #[error("request body exceeds the configured limit")]
    BodyTooLarge,
}

impl AuthError {
    pub(crate) fn rejected(scheme: Scheme, reason: impl Into<String>) -> Self {
        AuthError::Rejected {
            scheme,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let scheme = match &self {
            AuthError::Missing { scheme, .. } | AuthError::Rejected { scheme, .. } => *scheme,
            AuthError::BodyTooLarge => {
                return (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large").into_response();
            }
        };

        tracing::warn!(scheme = scheme.as_str(), reason = %self, "Authentication failed");
        metrics::record_auth_failure(scheme.as_str());

        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, HeaderValue::from_static(scheme.challenge()))],
            "Unauthorized",
        )
            .into_response()
    }
}

/// Error compiling [`AuthConfig`] into [`AuthSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthConfigError {
    #[error("pki key {key_id:?}: {reason}")]
    InvalidKey { key_id: String, reason: String },

    #[error("duplicate pki key id {0:?}")]
    DuplicateKeyId(String),

    #[error("bearer tokens must not be empty")]
    EmptyToken,
}

/// Credentials in verified, ready-to-use form.
#[derive(Debug)]
pub struct AuthSettings {
    pub mode: AuthMode,
    pub max_clock_skew_secs: u64,
    tokens: Vec<String>,
    keys: HashMap<String, VerifyingKey>,
}

impl AuthSettings {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthConfigError> {
        if config.bearer_tokens.iter().any(|t| t.trim().is_empty()) {
            return Err(AuthConfigError::EmptyToken);
        }

        let mut keys = HashMap::with_capacity(config.pki_keys.len());
        for entry in &config.pki_keys {
            let key = decode_public_key(&entry.public_key).map_err(|reason| {
                AuthConfigError::InvalidKey {
                    key_id: entry.key_id.clone(),
                    reason,
                }
            })?;
            if keys.insert(entry.key_id.clone(), key).is_some() {
                return Err(AuthConfigError::DuplicateKeyId(entry.key_id.clone()));
            }
        }

        Ok(Self {
            mode: config.mode,
            max_clock_skew_secs: config.max_clock_skew_secs,
            tokens: config.bearer_tokens.clone(),
            keys,
        })
    }

    pub fn accepts_token(&self, token: &str) -> bool {
        self.tokens
            .iter()
            .any(|known| constant_time_eq(known.as_bytes(), token.as_bytes()))
    }

    pub fn key(&self, key_id: &str) -> Option<&VerifyingKey> {
        self.keys.get(key_id)
    }
}

fn decode_public_key(encoded: &str) -> Result<VerifyingKey, String> {
    let bytes = STANDARD.decode(encoded.trim()).map_err(|e| e.to_string())?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected 32 bytes, got {}", b.len()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| e.to_string())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Shared authentication state for the middlewares.
#[derive(Clone)]
pub struct AuthState {
    settings: Arc<ArcSwap<AuthSettings>>,
    max_body_size: usize,
}

impl AuthState {
    pub fn new(settings: AuthSettings, max_body_size: usize) -> Self {
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            max_body_size,
        }
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Arc<AuthSettings> {
        self.settings.load_full()
    }

    /// Atomically install new settings (config reload).
    pub fn replace(&self, settings: AuthSettings) {
        self.settings.store(Arc::new(settings));
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

/// Authenticate with the scheme selected by `auth.mode`.
pub async fn require_auth(State(auth): State<AuthState>, request: Request, next: Next) -> Response {
    let settings = auth.settings();
    let scheme = match settings.mode {
        AuthMode::Bearer => Scheme::Bearer,
        AuthMode::Pki => Scheme::Pki,
        AuthMode::Any if request.headers().contains_key(AUTH_HEADER) => Scheme::Pki,
        AuthMode::Any => Scheme::Bearer,
    };

    let result = match scheme {
        Scheme::Bearer => bearer::authenticate(&settings, request),
        Scheme::Pki => pki::authenticate(&settings, auth.max_body_size, request).await,
    };

    match result {
        Ok(request) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
