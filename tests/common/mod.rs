//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::SigningKey;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use webid_server::auth::{sign_request, AUTH_HEADER, TIMESTAMP_HEADER};
use webid_server::config::{AuthMode, PkiKeyConfig, ServerConfig};
use webid_server::{HttpServer, Shutdown};

pub const TOKEN: &str = "test-token";
pub const KEY_ID: &str = "laptop";

pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[9u8; 32])
}

/// Config accepting `TOKEN` and signatures from `signing_key()`.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.mode = AuthMode::Any;
    config.auth.bearer_tokens = vec![TOKEN.into()];
    config.auth.pki_keys = vec![PkiKeyConfig {
        key_id: KEY_ID.into(),
        public_key: STANDARD.encode(signing_key().verifying_key().to_bytes()),
    }];
    config
}

pub async fn app(config: ServerConfig) -> Router {
    HttpServer::new(config).await.unwrap().router()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

pub fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

pub fn bearer_put(body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::PUT)
        .uri("/profile")
        .header("content-type", "application/ld+json")
        .header("authorization", format!("Bearer {}", TOKEN))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

pub fn signed(method: Method, path: &str, body: Vec<u8>, timestamp: u64) -> Request<Body> {
    let auth = sign_request(&signing_key(), KEY_ID, method.as_str(), path, timestamp, &body);
    Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .header(AUTH_HEADER, auth)
        .header(TIMESTAMP_HEADER, timestamp.to_string())
        .body(Body::from(body))
        .unwrap()
}

pub fn profile_named(name: &str) -> Value {
    json!({
        "@context": ["https://www.w3.org/ns/activitystreams", "http://w3id.org/webid"],
        "@id": "https://alice.example/profile",
        "primaryTopic": {
            "@id": "#me",
            "@type": ["Person"],
            "name": name,
            "inbox": "inbox"
        }
    })
}

pub fn json_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap()
}

/// Running server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<ServerConfig>,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

pub async fn start_server(config: ServerConfig) -> TestServer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    let handle = tokio::spawn(async move { server.run(listener, config_updates, server_shutdown).await });

    TestServer {
        addr,
        shutdown,
        config_tx,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
