//! CORS headers for the profile resource.
//!
//! Every response of the wrapped route gets the configured headers, and
//! any `OPTIONS` request is answered directly with `200 OK`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{self, InvalidHeaderValue},
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;

/// Pre-validated CORS header values.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
}

impl CorsHeaders {
    pub fn from_config(config: &CorsConfig) -> Result<Self, InvalidHeaderValue> {
        let expose_headers = match config.expose_headers.trim() {
            "" => None,
            value => Some(HeaderValue::from_str(value)?),
        };

        Ok(Self {
            allow_origin: HeaderValue::from_str(&config.allow_origin)?,
            allow_methods: HeaderValue::from_str(&config.allow_methods)?,
            allow_headers: HeaderValue::from_str(&config.allow_headers)?,
            expose_headers,
        })
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        if let Some(expose) = &self.expose_headers {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
    }
}

pub async fn cors_middleware(
    State(cors): State<Arc<CorsHeaders>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    cors.apply(response.headers_mut());
    response
}
