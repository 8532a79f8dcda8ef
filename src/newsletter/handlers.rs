use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::{
    auth::services::{is_valid_email, normalize_email},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
}

pub fn newsletter_routes() -> Router<AppState> {
    Router::new().route("/newsletter", post(subscribe))
}

#[instrument(skip(state, payload))]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, (StatusCode, String)> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err((StatusCode::BAD_REQUEST, "Invalid email address.".into()));
    }

    state.newsletter.subscribe(&email).await.map_err(|e| {
        error!(error = %e, "newsletter subscription failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to subscribe. Please try again.".to_string(),
        )
    })?;

    info!(%email, "newsletter subscriber added");
    Ok(Json(SubscribeResponse { success: true }))
}
