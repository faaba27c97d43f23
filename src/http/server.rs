//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, metrics)
//! - Protect profile writes with authentication, wrap `/profile` in CORS
//! - Serve until shutdown, applying config reloads to auth settings

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{require_auth, AuthSettings, AuthState};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::http::handlers::{
    delete_profile, get_profile, handle_root, health, not_found, profile_method_not_allowed,
    put_profile, root_method_not_allowed,
};
use crate::http::middleware::{cors_middleware, CorsHeaders};
use crate::http::request::{make_request_span, MakeRequestUuid};
use crate::lifecycle::shutdown::recv_shutdown;
use crate::observability::metrics::track_metrics;
use crate::profile::ProfileStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProfileStore>,
    pub started_at: Instant,
}

/// HTTP server for the profile.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    auth: AuthState,
}

impl HttpServer {
    /// Open the profile store and build the server.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let store = Arc::new(ProfileStore::open(&config.profile).await?);
        Self::with_store(config, store)
    }

    /// Build the server around an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<ProfileStore>) -> Result<Self, ServerError> {
        let auth = AuthState::new(
            AuthSettings::from_config(&config.auth)?,
            config.security.max_body_size,
        );
        let cors = Arc::new(CorsHeaders::from_config(&config.cors)?);

        let state = AppState {
            store,
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state, auth.clone(), cors);
        Ok(Self { router, config, auth })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ServerConfig,
        state: AppState,
        auth: AuthState,
        cors: Arc<CorsHeaders>,
    ) -> Router {
        let writes = put(put_profile)
            .delete(delete_profile)
            .route_layer(middleware::from_fn_with_state(auth, require_auth));

        let profile = get(get_profile)
            .merge(writes)
            .fallback(profile_method_not_allowed)
            .layer(middleware::from_fn_with_state(cors, cors_middleware));

        Router::new()
            .route("/", get(handle_root).fallback(root_method_not_allowed))
            .route("/profile", profile)
            .route("/health", get(health))
            .route_layer(middleware::from_fn(track_metrics))
            .fallback(not_found)
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Router for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Handle to the live auth settings.
    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Configurations arriving on `config_updates` replace the auth
    /// settings; changes to other sections are logged and ignored.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let auth = self.auth.clone();
        let mut current = self.config.clone();
        let reloader = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                apply_config_update(&auth, &mut current, new_config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(recv_shutdown(shutdown))
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn apply_config_update(auth: &AuthState, current: &mut ServerConfig, new_config: ServerConfig) {
    match AuthSettings::from_config(&new_config.auth) {
        Ok(settings) => {
            auth.replace(settings);
            tracing::info!(mode = ?new_config.auth.mode, "Auth settings reloaded");
        }
        Err(e) => {
            tracing::error!(error = %e, "Rejected auth settings from reloaded config");
            return;
        }
    }

    let mut expected = current.clone();
    expected.auth = new_config.auth.clone();
    if serde_json::to_value(&expected).ok() != serde_json::to_value(&new_config).ok() {
        tracing::warn!("Config changes outside [auth] take effect after a restart");
    }
    current.auth = new_config.auth;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    #[test]
    fn config_update_replaces_auth_only() {
        let auth = AuthState::new(AuthSettings::from_config(&AuthConfig::default()).unwrap(), 1024);
        let mut current = ServerConfig::default();

        let mut updated = ServerConfig::default();
        updated.auth.bearer_tokens = vec!["fresh".into()];
        updated.listener.bind_address = "127.0.0.1:1".into();
        apply_config_update(&auth, &mut current, updated);

        assert!(auth.settings().accepts_token("fresh"));
        assert_eq!(current.auth.bearer_tokens, vec!["fresh".to_string()]);
        assert_eq!(current.listener.bind_address, "0.0.0.0:8080");
    }
}
