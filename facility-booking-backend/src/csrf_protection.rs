use axum::extract::{Request, State};
use axum::http::{HeaderName, Method};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::Key;
use axum_extra::extract::PrivateCookieJar;

use crate::error::AppError;
use crate::session::Session;

pub static CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

#[must_use]
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Requests that change state must repeat the session's csrf token in the
/// `x-csrf-token` header.
pub async fn csrf_protection(
    State(key): State<Key>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !is_safe_method(request.method()) {
        let session = Session::new(PrivateCookieJar::from_headers(request.headers(), key));
        let actual = request
            .headers()
            .get(&CSRF_HEADER)
            .and_then(|value| value.to_str().ok());
        if actual != Some(session.csrf_token()) {
            return Err(AppError::WrongCsrfToken);
        }
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::{middleware, Router};
    use tower::ServiceExt as _;

    use super::*;

    fn app(key: Key) -> Router {
        Router::new()
            .route("/", post(|| async { "ok" }).get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(key, csrf_protection))
    }

    #[tokio::test]
    async fn safe_methods_pass() {
        let response = app(Key::generate())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn posts_without_a_token_are_forbidden() {
        let response = app(Key::generate())
            .oneshot(Request::post("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn a_token_without_a_session_is_forbidden() {
        let response = app(Key::generate())
            .oneshot(
                Request::post("/")
                    .header(&CSRF_HEADER, "guessed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn method_classification() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::OPTIONS));
        assert!(!is_safe_method(&Method::DELETE));
        assert!(!is_safe_method(&Method::PATCH));
    }
}
