//! HTTP - 生成・取得エンドポイントを Translator に接続
//!
//! # ルート
//! - `POST /image/generation`: OpenAI 形式の画像生成
//! - `GET /images/:id`: 保存済み artifact の取得
//! - `GET /healthz`: 死活確認と現在の artifact 数

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::app::translator::Translator;
use crate::domain::{GenerationRequest, StoreError, TranslateError};
use crate::impls::image_format;
use crate::ports::ForwardHeaders;

#[derive(Clone)]
pub struct AppState {
    pub translator: Arc<Translator>,
    pub base_url: Option<String>,
    pub scheme: String,
}

impl AppState {
    pub fn new(translator: Arc<Translator>) -> Self {
        Self {
            translator,
            base_url: None,
            scheme: "http".to_string(),
        }
    }

    /// Configured base URL; a missing scheme gets `self.scheme` prepended.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url
            .filter(|url| !url.is_empty())
            .map(|url| normalise_base_url(&url, &self.scheme));
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        if let Some(url) = self.base_url.take() {
            self.base_url = Some(normalise_base_url(&url, &self.scheme));
        }
        self
    }

    fn base_url_for(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.base_url {
            return url.clone();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        format!("{}://{}", self.scheme, host)
    }
}

pub fn normalise_base_url(url: &str, scheme: &str) -> String {
    let url = url.trim_end_matches('/');
    let has_scheme = ["http://", "https://"].iter().any(|prefix| {
        url.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    });
    if has_scheme {
        url.to_string()
    } else {
        format!("{scheme}://{url}")
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/image/generation", post(generate_image))
        .route("/images/:id", get(fetch_image))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn generate_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<crate::domain::GenerationResponse>, ApiError> {
    let request: GenerationRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", e.to_string()))?;

    let base_url = state.base_url_for(&headers);
    let forward = forward_headers(&headers);
    let response = state
        .translator
        .generate(&request, &forward, &base_url)
        .await?;
    Ok(Json(response))
}

async fn fetch_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state.translator.store().get(&id).await?;
    let mime = image_format::mime_for(&bytes);
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.translator.store();
    Json(json!({
        "status": "ok",
        "store": store.kind(),
        "artifacts": store.len().await,
    }))
}

fn forward_headers(headers: &HeaderMap) -> ForwardHeaders {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// HTTP-facing error with an OpenAI-style JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, "not_found", "Image not found"),
            StoreError::Expired(_) => ApiError::new(StatusCode::GONE, "expired", "Image expired"),
            StoreError::Decode(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "decode_failed", err.to_string())
            }
            StoreError::Io(_) | StoreError::IdGeneration(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_failed", err.to_string())
            }
        }
    }
}

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::Validation(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", message)
            }
            TranslateError::Upstream { status, body } => ApiError::new(
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                "upstream_error",
                body,
            ),
            TranslateError::Transport(e) if e.is_timeout() => {
                ApiError::new(StatusCode::GATEWAY_TIMEOUT, "upstream_timeout", e.to_string())
            }
            TranslateError::Transport(e) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "upstream_unreachable", e.to_string())
            }
            TranslateError::Decode(message) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "decode_failed", message)
            }
            TranslateError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), code = self.code, message = %self.message, "Request failed");
        } else {
            warn!(status = self.status.as_u16(), code = self.code, message = %self.message, "Request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::translator::testing::StubBackend;
    use crate::impls::image_format::fixtures;
    use crate::impls::{EphemeralConfig, EphemeralStore, PersistentStore};
    use crate::ports::{ArtifactStore, FixedClock, ImageBackend};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use chrono::{TimeDelta, TimeZone, Utc};
    use rstest::rstest;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with(backend: Arc<dyn ImageBackend>, store: Arc<dyn ArtifactStore>) -> Router {
        let translator = Arc::new(Translator::new(backend, store));
        router(AppState::new(translator))
    }

    fn generation(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/image/generation")
            .header(header::HOST, "proxy.test:8080")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "Bearer test-key")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn fetch(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn generate_then_fetch_serves_png() {
        let png = fixtures::png();
        let backend = Arc::new(StubBackend::images(vec![BASE64.encode(&png)]));
        let store: Arc<dyn ArtifactStore> = Arc::new(EphemeralStore::new(EphemeralConfig::default()));
        let app = app_with(backend.clone(), store);

        let response = app
            .clone()
            .oneshot(generation(json!({"model": "m", "prompt": "a cat", "n": 1})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let url = body["data"][0]["url"].as_str().unwrap().to_string();
        let path = url.strip_prefix("http://proxy.test:8080").unwrap();
        assert!(path.starts_with("/images/"));

        let response = app.oneshot(fetch(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), png.as_slice());

        let calls = backend.calls.lock().unwrap();
        assert!(calls[0]
            .1
            .iter()
            .any(|(k, v)| k == "authorization" && v == "Bearer test-key"));
    }

    #[tokio::test]
    async fn configured_base_url_is_used_in_links() {
        let backend = Arc::new(StubBackend::images(vec![BASE64.encode(fixtures::png())]));
        let store: Arc<dyn ArtifactStore> = Arc::new(EphemeralStore::new(EphemeralConfig::default()));
        let translator = Arc::new(Translator::new(backend, store));
        let app = router(
            AppState::new(translator)
                .with_scheme("https")
                .with_base_url(Some("images.example.com/".to_string())),
        );

        let response = app
            .oneshot(generation(json!({"model": "m", "prompt": "p"})))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert!(body["data"][0]["url"]
            .as_str()
            .unwrap()
            .starts_with("https://images.example.com/images/"));
    }

    #[rstest]
    #[case::count(json!({"model": "m", "prompt": "p", "n": 2}))]
    #[case::size(json!({"model": "m", "prompt": "p", "size": "abc"}))]
    #[case::missing_prompt(json!({"model": "m"}))]
    #[tokio::test]
    async fn invalid_requests_are_rejected_with_400(#[case] body: serde_json::Value) {
        let backend = Arc::new(StubBackend::images(vec![]));
        let store: Arc<dyn ArtifactStore> = Arc::new(EphemeralStore::new(EphemeralConfig::default()));
        let app = app_with(backend.clone(), store);

        let response = app.oneshot(generation(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "invalid_request");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn upstream_status_is_passed_through() {
        let backend = Arc::new(StubBackend::failing(429, "slow down"));
        let store: Arc<dyn ArtifactStore> = Arc::new(EphemeralStore::new(EphemeralConfig::default()));
        let app = app_with(backend, store);

        let response = app
            .oneshot(generation(json!({"model": "m", "prompt": "p"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(response).await["error"]["message"], "slow down");
    }

    #[tokio::test]
    async fn fetch_reports_missing_and_expired() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let store = Arc::new(
            EphemeralStore::new(EphemeralConfig {
                ttl: Duration::from_secs(60),
                max_bytes: None,
            })
            .with_clock(Arc::new(clock.clone())),
        );
        let handle = store.put(fixtures::png(), None).await.unwrap();
        let app = app_with(Arc::new(StubBackend::images(vec![])), store);

        let response = app
            .clone()
            .oneshot(fetch("/images/0123456789abcdef0123456789abcdef"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        clock.advance(TimeDelta::seconds(60));
        let path = format!("/images/{}", handle.id);
        let response = app.clone().oneshot(fetch(&path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
        let response = app.oneshot(fetch(&path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn persistent_store_is_fetchable_by_id() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(PersistentStore::open(dir.path()).await.unwrap());
        let handle = store.put(fixtures::jpeg(), Some("a dog")).await.unwrap();
        let app = app_with(Arc::new(StubBackend::images(vec![])), store);

        let response = app
            .oneshot(fetch(&format!("/images/{}", handle.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn healthz_reports_store() {
        let store: Arc<dyn ArtifactStore> = Arc::new(EphemeralStore::new(EphemeralConfig::default()));
        store.put(fixtures::png(), None).await.unwrap();
        let app = app_with(Arc::new(StubBackend::images(vec![])), store);

        let response = app.oneshot(fetch("/healthz")).await.unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"status": "ok", "store": "ephemeral", "artifacts": 1})
        );
    }

    #[rstest]
    #[case::not_found(StoreError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case::expired(StoreError::Expired("x".into()), StatusCode::GONE)]
    #[case::decode(StoreError::Decode("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case::io(StoreError::Io(std::io::Error::other("x")), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case::id(StoreError::IdGeneration("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn store_errors_map_to_status(#[case] err: StoreError, #[case] status: StatusCode) {
        assert_eq!(ApiError::from(err).status, status);
    }

    #[rstest]
    #[case::bare("example.com", "https", "https://example.com")]
    #[case::trailing_slash("http://example.com/", "https", "http://example.com")]
    #[case::with_port("localhost:8080", "http", "http://localhost:8080")]
    #[case::upper_case_scheme("HTTPS://example.com", "http", "HTTPS://example.com")]
    #[case::mixed_case_scheme("Http://example.com/", "https", "Http://example.com")]
    fn base_url_gets_scheme(#[case] url: &str, #[case] scheme: &str, #[case] expected: &str) {
        assert_eq!(normalise_base_url(url, scheme), expected);
    }
}
