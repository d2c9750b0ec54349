//! Shared helpers for middleware integration tests.

use std::sync::Arc;

use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use wiremock::MockServer;

use faceplate::signature::sign;
use faceplate::{FaceplateConfig, FaceplateLayer, Session, faceplate_middleware};

/// Route middleware logs through the test harness. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

pub const SECRET: &str = "test-app-secret";
pub const APP_ID: &str = "123456789";

/// Build a `signature.base64url(payload)` token the way the platform does.
pub fn make_signed_request(secret: &str, payload: &Value) -> String {
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}", sign(secret, &body), body)
}

pub fn test_config(server: Option<&MockServer>) -> FaceplateConfig {
    let mut config = FaceplateConfig::new(APP_ID, SECRET);
    if let Some(server) = server {
        config.graph_url = server.uri();
        config.api_url = server.uri();
    }
    config
}

/// A two-route app behind the faceplate middleware: `/whoami` reports the
/// attached session, `/echo` proves the body survives signed-request
/// sniffing.
pub fn build_test_app(config: FaceplateConfig, abort_on_error: bool) -> Router {
    init_tracing();
    let layer = Arc::new(
        FaceplateLayer::new(Arc::new(config), reqwest::Client::new())
            .with_abort_on_error(abort_on_error),
    );
    Router::new()
        .route("/whoami", get(whoami).post(whoami))
        .route("/echo", post(echo))
        .layer(from_fn(move |req, next| {
            let layer = layer.clone();
            faceplate_middleware(layer, req, next)
        }))
}

async fn whoami(session: Session) -> Json<Value> {
    Json(json!({
        "authenticated": session.is_authenticated(),
        "token": session.token(),
        "user_id": session.payload().and_then(|p| p.user_id.clone()),
    }))
}

async fn echo(session: Session, body: String) -> Json<Value> {
    Json(json!({
        "authenticated": session.is_authenticated(),
        "body": body,
    }))
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
