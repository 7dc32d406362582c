//! Browser-redirect endpoints: the payer's browser posts the gateway's
//! signed outcome here after leaving the payment page.
//!
//! Same authenticate-and-upsert path as the webhook, but the response is a
//! rendered outcome page. A failed hash check still persists the record;
//! the page just carries a suspicious-activity banner instead of a
//! confirmation.

use axum::{
    extract::{Request, State},
    response::Html,
};

use crate::domain::TxnStatus;
use crate::handlers::webhook::parse_form;
use crate::services::ingest::{self, CallbackChannel, CallbackFields, IngestOutcome};
use crate::AppState;

const MAX_CALLBACK_BODY: usize = 64 * 1024;

pub async fn payment_success(State(state): State<AppState>, req: Request) -> Html<String> {
    handle_redirect(state, req, CallbackChannel::RedirectSuccess).await
}

pub async fn payment_failure(State(state): State<AppState>, req: Request) -> Html<String> {
    handle_redirect(state, req, CallbackChannel::RedirectFailure).await
}

async fn handle_redirect(state: AppState, req: Request, channel: CallbackChannel) -> Html<String> {
    let raw = match axum::body::to_bytes(req.into_body(), MAX_CALLBACK_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(%channel, "redirect body could not be read: {}", e);
            return Html(render_error_page(None));
        }
    };
    let raw_body = String::from_utf8_lossy(&raw).into_owned();

    let fields = match CallbackFields::from_form(&parse_form(&raw)) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!(%channel, "redirect payload rejected: {}", e);
            return Html(render_error_page(None));
        }
    };

    match ingest::ingest_callback(&state.db, &fields, &raw_body, channel).await {
        Ok(outcome) => Html(render_outcome_page(&outcome)),
        Err(e) => {
            tracing::error!(txnid = %fields.txnid, %channel, "redirect ingestion failed: {}", e);
            Html(render_error_page(Some(&fields.txnid)))
        }
    }
}

fn render_outcome_page(outcome: &IngestOutcome) -> String {
    let (heading, detail) = match outcome.status {
        TxnStatus::Success => ("Payment confirmed", "Your payment was received."),
        TxnStatus::Processing => (
            "Payment in progress",
            "The payment is still being processed. You will be notified once it completes.",
        ),
        TxnStatus::Failed => ("Payment failed", "The payment was not completed."),
        TxnStatus::HashMismatch | TxnStatus::Initiated => (
            "Payment unverified",
            "The payment outcome could not be verified.",
        ),
    };

    let banner = if outcome.hash_verified {
        ""
    } else {
        r#"<p class="alert">Suspicious activity detected: the response could not be authenticated. This attempt has been flagged for review.</p>"#
    };

    render_page(
        heading,
        &format!(
            "{}<p>{}</p><p>Reference: <code>{}</code></p>",
            banner, detail, outcome.txnid
        ),
    )
}

fn render_error_page(txnid: Option<&str>) -> String {
    let reference = txnid
        .map(|t| format!("<p>Reference: <code>{}</code></p>", t))
        .unwrap_or_default();
    render_page(
        "Payment status unknown",
        &format!(
            "<p>We could not confirm the payment outcome. Please contact support.</p>{}",
            reference
        ),
    )
}

fn render_page(heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{heading}</title>
<style>
body {{ font-family: sans-serif; max-width: 40rem; margin: 4rem auto; }}
.alert {{ color: #9a1b1b; border: 1px solid #9a1b1b; padding: 0.75rem; }}
</style>
</head>
<body>
<h1>{heading}</h1>
{body}
</body>
</html>
"#
    )
}
