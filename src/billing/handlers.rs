use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use bytes::Bytes;
use tracing::{error, info, instrument, warn};

use super::webhook::{parse_event, verify_signature, BillingEvent, WebhookError, SIGNATURE_HEADER};
use crate::state::AppState;

pub fn billing_routes() -> Router<AppState> {
    Router::new().route("/api/webhooks/billing", post(billing_webhook))
}

/// POST /api/webhooks/billing
///
/// The signature is checked against the raw bytes before anything is parsed.
#[instrument(skip_all)]
pub async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, (StatusCode, String)> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    verify_signature(&body, signature, &state.config.billing_webhook_secret).map_err(|e| {
        warn!(bytes = body.len(), "billing webhook rejected: bad signature");
        bad_request(e)
    })?;

    match parse_event(&body).map_err(|e| {
        warn!(error = %e, "billing webhook payload rejected");
        bad_request(e)
    })? {
        BillingEvent::Ignored { event_name } => {
            info!(%event_name, "billing event ignored");
        }
        BillingEvent::StatusChange { email, update } => {
            let rows = state
                .profiles
                .update_status_by_email(&email, &update)
                .await
                .map_err(|e| {
                    error!(error = %e, %email, "subscription status update failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
                })?;
            if rows == 0 {
                info!(%email, "billing event for unknown profile; nothing to update");
            } else {
                info!(%email, status = update.status.as_str(), "subscription status updated");
            }
        }
    }
    Ok("ok")
}

fn bad_request(e: WebhookError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}
