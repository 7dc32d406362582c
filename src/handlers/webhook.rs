//! Webhook endpoint for gateway-originated callbacks.
//!
//! The gateway retries indefinitely on anything but 200, so this endpoint
//! acknowledges every request with `200 OK` / `"OK"` no matter what
//! happened internally. Failures are logged and recorded, never surfaced
//! to the transport.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;

use crate::services::ingest::{self, CallbackChannel, CallbackFields};
use crate::AppState;

pub const WEBHOOK_ACK: &str = "OK";

/// Callback bodies are small forms; anything bigger is not the gateway.
const MAX_CALLBACK_BODY: usize = 64 * 1024;

/// Lenient form decode: no rejection path, malformed input just yields
/// fewer fields.
pub(crate) fn parse_form(raw: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

fn ack() -> Response {
    (StatusCode::OK, WEBHOOK_ACK).into_response()
}

pub async fn webhook(State(state): State<AppState>, req: Request) -> Response {
    let raw = match axum::body::to_bytes(req.into_body(), MAX_CALLBACK_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("webhook body could not be read: {}", e);
            return ack();
        }
    };
    let raw_body = String::from_utf8_lossy(&raw).into_owned();

    let fields = match CallbackFields::from_form(&parse_form(&raw)) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!(body_len = raw.len(), "webhook payload rejected: {}", e);
            return ack();
        }
    };

    match ingest::ingest_callback(&state.db, &fields, &raw_body, CallbackChannel::Webhook).await {
        Ok(outcome) => {
            if outcome.superseded_terminal {
                tracing::warn!(
                    txnid = %outcome.txnid,
                    status = %outcome.status,
                    "webhook rewrote an already-terminal transaction"
                );
            }
        }
        Err(e) => {
            tracing::error!(txnid = %fields.txnid, "webhook ingestion failed: {}", e);
        }
    }

    ack()
}
