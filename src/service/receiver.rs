//! Webhook receiver that validates GitHub deliveries and publishes them to the bus.
//!
//! Valid deliveries are published as `(event, body)`. Invalid ones are answered with
//! a 400 and reported on the `error` topic as `{msg, remote_addr, forwarded_for}`.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    routing::post,
};
use bytes::Bytes;
use ring::hmac;
use serde_json::json;
use tracing::{error, info, instrument};

use crate::{
    base::{config::Config, types::Void},
    service::bus::EventPublisher,
};

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Topic used to report rejected requests.
pub const ERROR_TOPIC: &str = "error";

/// Reasons a webhook delivery is rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReceiverError {
    #[error("request does not appear to be a webhook event")]
    NotAWebhook,
    #[error("request is not json")]
    NotJson,
    #[error("no signature in request")]
    MissingSignature,
    #[error("request failed signature validation")]
    BadSignature,
    #[error("request body is not valid json")]
    InvalidBody,
}

/// Compute the `X-Hub-Signature-256` value for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, body);

    format!("{SIGNATURE_PREFIX}{}", hex::encode(tag.as_ref()))
}

/// Check a `sha256=<hex>` signature against `body` in constant time.
fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), ReceiverError> {
    let digest = signature.strip_prefix(SIGNATURE_PREFIX).ok_or(ReceiverError::BadSignature)?;
    let digest = hex::decode(digest).map_err(|_| ReceiverError::BadSignature)?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, body, &digest).map_err(|_| ReceiverError::BadSignature)
}

/// Whether the content type is JSON (`application/json` or any `+json` type).
fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Validate a delivery and return its event type.
pub fn validate_request(headers: &HeaderMap, body: &[u8], secret: Option<&str>) -> Result<String, ReceiverError> {
    let event = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()).ok_or(ReceiverError::NotAWebhook)?;

    if !is_json(headers) {
        return Err(ReceiverError::NotJson);
    }

    // An empty secret counts as unset.
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).ok_or(ReceiverError::MissingSignature)?;
        verify_signature(secret, body, signature)?;
    }

    serde_json::from_slice::<serde::de::IgnoredAny>(body).map_err(|_| ReceiverError::InvalidBody)?;

    Ok(event.to_string())
}

// Server.

/// Shared state for the receiver routes.
#[derive(Clone)]
pub struct ReceiverState {
    pub publisher: EventPublisher,
    pub secret: Option<Arc<str>>,
}

impl ReceiverState {
    pub fn new(publisher: EventPublisher, secret: Option<&str>) -> Self {
        Self {
            publisher,
            secret: secret.filter(|s| !s.is_empty()).map(Arc::from),
        }
    }
}

/// Build the receiver router.
pub fn router(state: ReceiverState) -> Router {
    Router::new().route("/hook", post(handle_webhook)).with_state(state)
}

#[instrument(skip_all)]
async fn handle_webhook(State(state): State<ReceiverState>, ConnectInfo(remote): ConnectInfo<SocketAddr>, headers: HeaderMap, body: Bytes) -> (StatusCode, &'static str) {
    match validate_request(&headers, &body, state.secret.as_deref()) {
        Ok(event) => {
            info!("received {} webhook", event);

            if let Err(e) = state.publisher.publish(&event, &body).await {
                error!("failed to publish {} event: {}", event, e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
            }

            (StatusCode::OK, "OK")
        }
        Err(err) => {
            error!("request failed: {}", err);

            let report = json!({
                "msg": err.to_string(),
                "remote_addr": remote.ip().to_string(),
                "forwarded_for": headers.get(FORWARDED_FOR_HEADER).and_then(|v| v.to_str().ok()),
            });

            if let Err(e) = state.publisher.publish(ERROR_TOPIC, report.to_string().as_bytes()).await {
                error!("failed to publish error report: {}", e);
            }

            (StatusCode::BAD_REQUEST, "Invalid request")
        }
    }
}

/// Run the receiver until Ctrl-C.
pub async fn serve(config: &Config) -> Void {
    let publisher = EventPublisher::zmq(config).await?;
    let state = ReceiverState::new(publisher, config.webhook_secret.as_deref());

    let listener = tokio::net::TcpListener::bind(config.webhook_bind).await?;
    info!("webhook receiver listening on {}", config.webhook_bind);

    axum::serve(listener, router(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl-C, shutting down ...");
        })
        .await?;

    Ok(())
}

// Tests.
