//! Request handlers for `/`, `/profile` and `/health`.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use crate::auth::Principal;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::profile::{IfMatch, ProfileDocument, WriteOutcome};

const ROOT_ALLOW: &str = "GET, HEAD";
const PROFILE_ALLOW: &str = "GET, HEAD, PUT, DELETE, OPTIONS";
const JSON_CONTENT_TYPE: &str = "application/json";

/// `GET /`: the profile document.
pub async fn handle_root(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    read_profile(&state, &headers).await
}

pub async fn root_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed { allow: ROOT_ALLOW }
}

/// `GET /profile`.
pub async fn get_profile(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    read_profile(&state, &headers).await
}

/// `PUT /profile`: create or replace the profile.
pub async fn put_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if !is_json(&headers) {
        return Err(ApiError::UnsupportedMediaType);
    }

    let document: ProfileDocument = serde_json::from_slice(&body).map_err(|e| {
        if e.is_data() {
            ApiError::InvalidProfile(vec![e.to_string()])
        } else {
            ApiError::MalformedJson(e.to_string())
        }
    })?;
    document
        .validate()
        .map_err(|errors| ApiError::InvalidProfile(errors.iter().map(ToString::to_string).collect()))?;

    let if_match = parse_if_match(&headers)?;
    let (outcome, stored) = state.store.put(document, if_match.as_ref()).await?;

    metrics::record_profile_write("put");
    tracing::info!(principal = %principal, etag = %stored.etag, outcome = ?outcome, "Profile written");

    let response = match outcome {
        WriteOutcome::Created => (
            StatusCode::CREATED,
            [(header::LOCATION, "/profile".to_string()), (header::ETAG, stored.etag.clone())],
        )
            .into_response(),
        WriteOutcome::Replaced => {
            (StatusCode::NO_CONTENT, [(header::ETAG, stored.etag.clone())]).into_response()
        }
    };
    Ok(response)
}

/// `DELETE /profile`.
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let if_match = parse_if_match(&headers)?;
    state.store.delete(if_match.as_ref()).await?;

    metrics::record_profile_write("delete");
    tracing::info!(principal = %principal, "Profile deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn profile_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed { allow: PROFILE_ALLOW }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub profile_present: bool,
}

/// `GET /health`.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        profile_present: state.store.get().await.is_some(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn read_profile(state: &AppState, headers: &HeaderMap) -> Result<Response, ApiError> {
    let stored = state.store.get().await.ok_or(ApiError::NotFound)?;

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|value| if_none_match_hits(value, &stored.etag));
    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, stored.etag.clone())]).into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, JSON_CONTENT_TYPE.to_string()),
            (header::ETAG, stored.etag.clone()),
        ],
        stored.body.clone(),
    )
        .into_response())
}

/// Weak comparison, as `If-None-Match` requires.
fn if_none_match_hits(header: &str, etag: &str) -> bool {
    header.split(',').map(str::trim).any(|tag| {
        tag == "*" || tag.strip_prefix("W/").unwrap_or(tag) == etag
    })
}

/// A present but unreadable `If-Match` fails the precondition rather than
/// letting the write through unconditionally.
fn parse_if_match(headers: &HeaderMap) -> Result<Option<IfMatch>, ApiError> {
    headers
        .get(header::IF_MATCH)
        .map(|v| {
            v.to_str()
                .map(IfMatch::parse)
                .map_err(|_| ApiError::PreconditionFailed)
        })
        .transpose()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|essence| {
            let essence = essence.trim();
            essence.eq_ignore_ascii_case("application/json")
                || essence.eq_ignore_ascii_case("application/ld+json")
        })
        .unwrap_or(false)
}
