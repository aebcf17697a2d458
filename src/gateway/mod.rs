//! Webhook HTTP server.
//!
//! One endpoint matters: `POST /callback`, the LINE platform's delivery
//! target. The raw body is verified against the `X-Line-Signature`
//! header before anything is decoded; a bad signature rejects the whole
//! request with 400 and zero side effects. Event processing is
//! synchronous — the 200 `OK` goes back only after the batch is handled.

use crate::dispatch::Dispatcher;
use crate::events::decode_events;
use anyhow::Result;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Max webhook payload size: 1 MB. Media arrives via a separate content
/// fetch, so event batches are small JSON.
const WEBHOOK_MAX_BODY: usize = 1_048_576;

#[derive(Clone)]
pub struct GatewayState {
    channel_secret: String,
    dispatcher: Arc<Dispatcher>,
}

impl GatewayState {
    pub fn new(channel_secret: &str, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            channel_secret: channel_secret.to_string(),
            dispatcher,
        }
    }
}

/// Validate the LINE webhook signature: base64-encoded HMAC-SHA256 over
/// the raw request body, keyed by the channel secret.
pub fn validate_line_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/callback", post(callback_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// POST /callback — LINE webhook delivery.
async fn callback_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    if body.len() > WEBHOOK_MAX_BODY {
        warn!("webhook payload too large ({} bytes)", body.len());
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let Some(signature) = headers
        .get("X-Line-Signature")
        .and_then(|v| v.to_str().ok())
    else {
        warn!("webhook request missing X-Line-Signature header");
        return StatusCode::BAD_REQUEST.into_response();
    };

    if !validate_line_signature(&state.channel_secret, signature, &body) {
        warn!("webhook signature validation failed");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let events = match decode_events(&body) {
        Ok(events) => events,
        Err(e) => {
            warn!("webhook payload undecodable: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    debug!("webhook batch decoded, {} event(s)", events.len());
    state.dispatcher.dispatch(events).await;

    (StatusCode::OK, "OK").into_response()
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// Bind and serve until the task is cancelled or the listener fails.
pub async fn start(host: &str, port: u16, state: GatewayState) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("webhook server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
