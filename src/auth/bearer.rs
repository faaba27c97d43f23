//! Bearer token authentication.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{AuthError, AuthSettings, AuthState, Principal, Scheme};

/// Check `Authorization: Bearer <token>` against the configured tokens.
pub fn verify_bearer(settings: &AuthSettings, headers: &HeaderMap) -> Result<Principal, AuthError> {
    let missing = || AuthError::Missing {
        scheme: Scheme::Bearer,
        header: "Authorization",
    };

    let value = headers.get(header::AUTHORIZATION).ok_or_else(missing)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::rejected(Scheme::Bearer, "Authorization header is not visible ASCII"))?
        .trim();
    if value.is_empty() {
        return Err(missing());
    }

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::rejected(Scheme::Bearer, "expected `Bearer <token>`"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::rejected(
            Scheme::Bearer,
            format!("unsupported authorization scheme {:?}", scheme),
        ));
    }

    if settings.accepts_token(token.trim()) {
        Ok(Principal::Bearer)
    } else {
        Err(AuthError::rejected(Scheme::Bearer, "unknown bearer token"))
    }
}

pub(crate) fn authenticate(settings: &AuthSettings, mut request: Request) -> Result<Request, AuthError> {
    let principal = verify_bearer(settings, request.headers())?;
    request.extensions_mut().insert(principal);
    Ok(request)
}

/// Middleware accepting only bearer credentials.
pub async fn bearer_auth(State(auth): State<AuthState>, request: Request, next: Next) -> Response {
    match authenticate(&auth.settings(), request) {
        Ok(request) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use axum::{
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    fn settings() -> AuthSettings {
        AuthSettings::from_config(&AuthConfig {
            bearer_tokens: vec!["s3cret".into()],
            ..AuthConfig::default()
        })
        .unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_known_token_any_scheme_case() {
        assert_eq!(verify_bearer(&settings(), &headers("Bearer s3cret")).unwrap(), Principal::Bearer);
        assert_eq!(verify_bearer(&settings(), &headers("bearer  s3cret ")).unwrap(), Principal::Bearer);
    }

    #[test]
    fn missing_or_empty_header() {
        let err = verify_bearer(&settings(), &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, AuthError::Missing { header: "Authorization", .. }));

        let err = verify_bearer(&settings(), &headers("")).unwrap_err();
        assert!(matches!(err, AuthError::Missing { .. }));
    }

    #[test]
    fn rejects_other_schemes_and_tokens() {
        assert!(matches!(
            verify_bearer(&settings(), &headers("Basic czNjcmV0")),
            Err(AuthError::Rejected { .. })
        ));
        assert!(matches!(
            verify_bearer(&settings(), &headers("Bearer wrong")),
            Err(AuthError::Rejected { .. })
        ));
        assert!(matches!(
            verify_bearer(&settings(), &headers("s3cret")),
            Err(AuthError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn middleware_guards_route() {
        let state = AuthState::new(settings(), 1024);
        let app = Router::new()
            .route(
                "/",
                get(|Extension(principal): Extension<Principal>| async move { principal.to_string() }),
            )
            .layer(middleware::from_fn_with_state(state, bearer_auth));

        let response = app
            .clone()
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Bearer realm=\"webid\""
        );

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"bearer");
    }
}
