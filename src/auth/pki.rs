//! Signature-based (PKI) authentication.
//!
//! A client signs `"<METHOD> <path-and-query>\n<timestamp>\n<hex sha256(body)>"`
//! with an Ed25519 key and sends
//!
//! ```text
//! Auth: <key-id> <base64 signature>
//! X-Auth-Timestamp: <unix seconds>
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey};
use sha2::{Digest, Sha256};

use crate::auth::{AuthError, AuthSettings, AuthState, Principal, Scheme};

pub const AUTH_HEADER: &str = "auth";
pub const TIMESTAMP_HEADER: &str = "x-auth-timestamp";

/// Bytes covered by the signature.
pub fn signing_message(method: &str, path_and_query: &str, timestamp: u64, body: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(body);
    format!("{} {}\n{}\n{:x}", method, path_and_query, timestamp, digest).into_bytes()
}

/// Build the `Auth` header value for a request.
pub fn sign_request(
    key: &SigningKey,
    key_id: &str,
    method: &str,
    path_and_query: &str,
    timestamp: u64,
    body: &[u8],
) -> String {
    let signature = key.sign(&signing_message(method, path_and_query, timestamp, body));
    format!("{} {}", key_id, STANDARD.encode(signature.to_bytes()))
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>, AuthError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
            .map_err(|_| AuthError::rejected(Scheme::Pki, format!("{} header is not visible ASCII", name))),
    }
}

/// Verify the signature headers of a buffered request.
pub fn verify_signature(
    settings: &AuthSettings,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
    now: u64,
) -> Result<Principal, AuthError> {
    let value = header_str(headers, AUTH_HEADER)?.ok_or(AuthError::Missing {
        scheme: Scheme::Pki,
        header: "Auth",
    })?;

    let (key_id, encoded) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::rejected(Scheme::Pki, "expected `<key-id> <signature>`"))?;
    let key = settings
        .key(key_id)
        .ok_or_else(|| AuthError::rejected(Scheme::Pki, format!("unknown key id {:?}", key_id)))?;

    let timestamp: u64 = header_str(headers, TIMESTAMP_HEADER)?
        .ok_or_else(|| AuthError::rejected(Scheme::Pki, "missing X-Auth-Timestamp header"))?
        .parse()
        .map_err(|_| AuthError::rejected(Scheme::Pki, "X-Auth-Timestamp is not a unix timestamp"))?;
    if now.abs_diff(timestamp) > settings.max_clock_skew_secs {
        return Err(AuthError::rejected(Scheme::Pki, "timestamp outside allowed clock skew"));
    }

    let signature = STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| Signature::from_slice(&bytes).ok())
        .ok_or_else(|| AuthError::rejected(Scheme::Pki, "malformed signature"))?;

    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let message = signing_message(method.as_str(), path_and_query, timestamp, body);
    key.verify_strict(&message, &signature)
        .map_err(|_| AuthError::rejected(Scheme::Pki, "signature does not match"))?;

    Ok(Principal::Key {
        key_id: key_id.to_string(),
    })
}

/// Buffer the body, verify, and rebuild the request with the principal attached.
pub(crate) async fn authenticate(
    settings: &AuthSettings,
    max_body_size: usize,
    request: Request,
) -> Result<Request, AuthError> {
    // Reject before reading the body when there is nothing to verify.
    if header_str(request.headers(), AUTH_HEADER)?.is_none() {
        return Err(AuthError::Missing {
            scheme: Scheme::Pki,
            header: "Auth",
        });
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, max_body_size)
        .await
        .map_err(|_| AuthError::BodyTooLarge)?;

    let principal = verify_signature(settings, &parts.method, &parts.uri, &parts.headers, &bytes, unix_now())?;

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(principal);
    Ok(request)
}

/// Middleware accepting only signed requests.
pub async fn pki_auth(State(auth): State<AuthState>, request: Request, next: Next) -> Response {
    match authenticate(&auth.settings(), auth.max_body_size(), request).await {
        Ok(request) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
