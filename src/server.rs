use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::TwrError;
use crate::telemetry::get_metrics;
use crate::token_generator::TokenGenerator;
use crate::updater::Updater;

/// Static UI page served to browser clients on `/`
const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared state for the front door; the generator and updater are traits so
/// tests can substitute deterministic doubles
#[derive(Clone)]
pub struct AppState {
    generator: Arc<dyn TokenGenerator>,
    updater: Arc<dyn Updater>,
    lavalink_url: String,
}

impl AppState {
    pub fn new(
        generator: Arc<dyn TokenGenerator>,
        updater: Arc<dyn Updater>,
        lavalink_url: String,
    ) -> Self {
        Self {
            generator,
            updater,
            lavalink_url,
        }
    }
}

/// Successful refresh response
#[derive(Serialize)]
struct RefreshSuccess {
    success: bool,
    message: &'static str,
}

/// Failed refresh response; the error text is all a caller sees, details go
/// to the log
#[derive(Serialize)]
struct RefreshFailure {
    success: bool,
    error: String,
}

fn refresh_failure(error: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(RefreshFailure {
            success: false,
            error: error.into(),
        }),
    )
        .into_response()
}

/// Webhook endpoint: generate a fresh token pair and push it to Lavalink.
/// GET and POST behave identically.
async fn refresh_handler(State(state): State<AppState>) -> Response {
    info!("Token refresh requested via webhook");

    if let Some(m) = get_metrics() {
        m.refresh_requests.add(1, &[]);
    }

    let gen_start = Instant::now();
    let pair = match state.generator.generate().await {
        Ok(pair) => pair,
        Err(TwrError::Generation(e)) => {
            error!("Token generation failed: {}", e);
            if let Some(m) = get_metrics() {
                m.generation_failures.add(1, &[]);
            }
            return refresh_failure("Failed to generate token");
        }
        Err(e) => {
            error!("Error in refresh endpoint: {}", e);
            return refresh_failure(e.to_string());
        }
    };
    if let Some(m) = get_metrics() {
        m.generation_seconds
            .record(gen_start.elapsed().as_secs_f64(), &[]);
    }

    // Generator call succeeded but produced an unusable pair; same outward
    // failure, distinguished only here
    if !pair.is_complete() {
        warn!("Generator returned an incomplete token pair");
        if let Some(m) = get_metrics() {
            m.generation_failures.add(1, &[]);
        }
        return refresh_failure("Failed to generate token");
    }

    let update_start = Instant::now();
    let updated = state.updater.update(&pair.po_token, &pair.visitor_data).await;
    if let Some(m) = get_metrics() {
        m.update_seconds
            .record(update_start.elapsed().as_secs_f64(), &[]);
    }

    if updated {
        if let Some(m) = get_metrics() {
            m.refresh_success.add(1, &[]);
        }
        (
            StatusCode::OK,
            Json(RefreshSuccess {
                success: true,
                message: "Token refreshed successfully",
            }),
        )
            .into_response()
    } else {
        if let Some(m) = get_metrics() {
            m.update_failures.add(1, &[]);
        }
        refresh_failure("Failed to update Lavalink")
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Liveness only, no dependency checks
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "healthy" }))
}

/// JSON service descriptor returned to non-browser clients on `/`
#[derive(Serialize)]
struct ServiceDescriptor {
    service: &'static str,
    endpoints: EndpointSummary,
    lavalink_url: String,
}

#[derive(Serialize)]
struct EndpointSummary {
    #[serde(rename = "/refresh")]
    refresh: &'static str,
    #[serde(rename = "/health")]
    health: &'static str,
}

/// Info endpoint: HTML page for browsers, JSON descriptor for everyone else
async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let accepts_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        return Html(INDEX_HTML).into_response();
    }

    let descriptor = ServiceDescriptor {
        service: "Lavalink Token Refresh Webhook",
        endpoints: EndpointSummary {
            refresh: "POST or GET - Refresh YouTube token",
            health: "GET - Health check",
        },
        lavalink_url: state.lavalink_url.clone(),
    };

    Json(descriptor).into_response()
}

/// Create the front door router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/refresh", get(refresh_handler).post(refresh_handler))
        .route("/health", get(health_handler))
        .route("/", get(index_handler))
        .with_state(state)
}

/// Bind and serve the front door until shutdown
pub async fn start_server(addr: &str, state: AppState) -> crate::error::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(addr).await?;

    info!("Webhook server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| {
            error!("Webhook server error: {}", e);
            TwrError::Io(e)
        })
}
