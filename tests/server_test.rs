//! Front door tests with stubbed generator and updater.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use twr::error::{Result, TwrError};
use twr::server::{router, AppState};
use twr::token_generator::{TokenGenerator, TokenPair};
use twr::updater::Updater;

/// Generator that always returns the same pair
struct StaticGenerator(TokenPair);

#[async_trait]
impl TokenGenerator for StaticGenerator {
    async fn generate(&self) -> Result<TokenPair> {
        Ok(self.0.clone())
    }
}

/// Generator that fails outright
struct FailingGenerator;

#[async_trait]
impl TokenGenerator for FailingGenerator {
    async fn generate(&self) -> Result<TokenPair> {
        Err(TwrError::Generation("browser automation exploded".to_string()))
    }
}

/// Generator that fails with something other than a generation error
struct BrokenGenerator;

#[async_trait]
impl TokenGenerator for BrokenGenerator {
    async fn generate(&self) -> Result<TokenPair> {
        Err(TwrError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "generator runtime unavailable",
        )))
    }
}

/// Updater with a fixed outcome that counts its invocations
struct StubUpdater {
    outcome: bool,
    calls: AtomicU64,
}

impl StubUpdater {
    fn new(outcome: bool) -> Self {
        Self {
            outcome,
            calls: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Updater for StubUpdater {
    async fn update(&self, _po_token: &str, _visitor_data: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
    }
}

fn valid_pair() -> TokenPair {
    TokenPair {
        po_token: "MnQtokenvaluewithplentylength".to_string(),
        visitor_data: "CgtWaXNpdG9yRGF0YQ==".to_string(),
    }
}

fn state_with(generator: Arc<dyn TokenGenerator>, updater: Arc<dyn Updater>) -> AppState {
    AppState::new(generator, updater, "http://localhost:9296".to_string())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body should be valid JSON")
}

#[tokio::test]
async fn refresh_succeeds_when_generator_and_updater_succeed() {
    let updater = Arc::new(StubUpdater::new(true));
    let state = state_with(Arc::new(StaticGenerator(valid_pair())), updater.clone());

    let response = router(state)
        .oneshot(Request::get("/refresh").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Token refreshed successfully");
    assert_eq!(updater.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_accepts_post_as_well() {
    let state = state_with(
        Arc::new(StaticGenerator(valid_pair())),
        Arc::new(StubUpdater::new(true)),
    );

    let response = router(state)
        .oneshot(Request::post("/refresh").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn refresh_reports_generation_failure() {
    let updater = Arc::new(StubUpdater::new(true));
    let state = state_with(Arc::new(FailingGenerator), updater.clone());

    let response = router(state)
        .oneshot(Request::get("/refresh").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failed to generate token");
    // The updater must never be reached on generation failure
    assert_eq!(updater.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_surfaces_unexpected_error_message() {
    // Non-generation errors pass their own display text through, not the
    // fixed generation message
    let updater = Arc::new(StubUpdater::new(true));
    let state = state_with(Arc::new(BrokenGenerator), updater.clone());

    let response = router(state)
        .oneshot(Request::get("/refresh").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "IO error: generator runtime unavailable");
    assert_eq!(updater.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_rejects_incomplete_pair() {
    let incomplete = TokenPair {
        po_token: "MnQtokenvaluewithplentylength".to_string(),
        visitor_data: String::new(),
    };
    let updater = Arc::new(StubUpdater::new(true));
    let state = state_with(Arc::new(StaticGenerator(incomplete)), updater.clone());

    let response = router(state)
        .oneshot(Request::get("/refresh").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to generate token");
    assert_eq!(updater.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_reports_update_failure() {
    let state = state_with(
        Arc::new(StaticGenerator(valid_pair())),
        Arc::new(StubUpdater::new(false)),
    );

    let response = router(state)
        .oneshot(Request::get("/refresh").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failed to update Lavalink");
}

#[tokio::test]
async fn health_is_always_healthy() {
    // Even with a broken generator and updater the health check stays green
    let state = state_with(Arc::new(FailingGenerator), Arc::new(StubUpdater::new(false)));

    let response = router(state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn index_returns_json_descriptor_by_default() {
    let state = state_with(
        Arc::new(StaticGenerator(valid_pair())),
        Arc::new(StubUpdater::new(true)),
    );

    let response = router(state)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], "Lavalink Token Refresh Webhook");
    assert_eq!(body["lavalink_url"], "http://localhost:9296");
    assert!(body["endpoints"].get("/refresh").is_some());
    assert!(body["endpoints"].get("/health").is_some());
}

#[tokio::test]
async fn index_serves_html_to_browsers() {
    let state = state_with(
        Arc::new(StaticGenerator(valid_pair())),
        Arc::new(StubUpdater::new(true)),
    );

    let request = Request::get("/")
        .header("accept", "text/html,application/xhtml+xml")
        .body(Body::empty())
        .unwrap();
    let response = router(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.contains("text/html"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = std::str::from_utf8(&bytes).unwrap();
    assert!(html.contains("<html"));
}

#[tokio::test]
async fn concurrent_refreshes_complete_independently() {
    let updater = Arc::new(StubUpdater::new(true));
    let state = state_with(Arc::new(StaticGenerator(valid_pair())), updater.clone());

    let app_a = router(state.clone());
    let app_b = router(state);

    let (a, b) = tokio::join!(
        app_a.oneshot(Request::get("/refresh").body(Body::empty()).unwrap()),
        app_b.oneshot(Request::post("/refresh").body(Body::empty()).unwrap()),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(updater.calls.load(Ordering::SeqCst), 2);

    for response in [a, b] {
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
    }
}
