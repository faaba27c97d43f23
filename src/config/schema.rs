//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the profile server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Profile document storage.
    pub profile: ProfileConfig,

    /// Credentials accepted for profile writes.
    pub auth: AuthConfig,

    /// CORS headers applied to `/profile`.
    pub cors: CorsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Profile storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// JSON file the profile is persisted to. Memory only when unset.
    pub storage_path: Option<PathBuf>,

    /// Install the built-in profile when nothing is stored yet.
    pub seed_default: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            seed_default: true,
        }
    }
}

/// Which credential scheme protects profile writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// `Auth: <key-id> <signature>`.
    Pki,
    /// PKI when an `Auth` header is present, bearer otherwise.
    Any,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,

    /// Accepted bearer tokens.
    pub bearer_tokens: Vec<String>,

    /// Ed25519 public keys accepted for signed requests.
    pub pki_keys: Vec<PkiKeyConfig>,

    /// Maximum distance between `X-Auth-Timestamp` and the server clock.
    pub max_clock_skew_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Bearer,
            bearer_tokens: Vec::new(),
            pki_keys: Vec::new(),
            max_clock_skew_secs: 300,
        }
    }
}

/// A named Ed25519 public key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PkiKeyConfig {
    /// Identifier sent by clients in the `Auth` header.
    pub key_id: String,

    /// Base64 (standard alphabet) encoding of the 32 byte public key.
    pub public_key: String,
}

/// CORS header values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
    pub expose_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, HEAD, OPTIONS, PUT, DELETE, POST".to_string(),
            allow_headers: "Content-Type, Authorization, Auth, If-Match, X-Auth-Timestamp"
                .to_string(),
            expose_headers: "ETag".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
