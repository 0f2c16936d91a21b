//! HTTP layer: router, shared state, auth, and the JSON extractor (§10.1).
//! This is the only module that constructs axum types or HTTP status codes
//! directly outside of `error.rs`'s `IntoResponse` impl.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRequest, Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::orchestrator::{AppContext, run_commit};
use crate::request::CommitRequest;

const AUTH_HEADER: &str = "x-internal-secret";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
    pub shared_secret: Arc<str>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            post(commit_handler).route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// Runs before the request body is parsed, so an auth failure never costs a
/// JSON-deserialization attempt on an untrusted body.
async fn auth_middleware(State(state): State<AppState>, headers: HeaderMap, req: Request, next: Next) -> Response {
    if let Err(e) = authenticate(&headers, &state.shared_secret) {
        return e.into_response();
    }
    next.run(req).await
}

#[derive(Serialize)]
struct Healthz {
    status: &'static str,
}

async fn healthz() -> Json<Healthz> {
    Json(Healthz { status: "ok" })
}

fn authenticate(headers: &HeaderMap, shared_secret: &str) -> Result<(), AppError> {
    let provided = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::MissingAuth)?;

    if shared_secret.is_empty() || provided != shared_secret {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// A `Json<T>` extractor whose rejection maps to `AppError::BadRequest`
/// instead of axum's default 422, so malformed bodies surface through the
/// same error channel as every other validation failure (§10.1).
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(ValidatedJson(value))
    }
}

async fn commit_handler(State(state): State<AppState>, ValidatedJson(req): ValidatedJson<CommitRequest>) -> Response {
    match run_commit(&state.ctx, req).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store_adapter::StoreAdapter;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use object_store::memory::InMemory;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            ctx: Arc::new(AppContext {
                repos: StoreAdapter::new(Arc::new(InMemory::new())),
                file_transfer: StoreAdapter::new(Arc::new(InMemory::new())),
            }),
            shared_secret: Arc::from("sekret"),
        }
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let router = build_router(test_state());
        let response = router
            .oneshot(HttpRequest::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_without_auth_header_is_rejected() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn post_with_wrong_secret_is_unauthorized() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .header(AUTH_HEADER, "nope")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_json_body_is_bad_request() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .header(AUTH_HEADER, "sekret")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
