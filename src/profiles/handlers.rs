use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{AdminProfileItem, PublicProfile};
use crate::{
    auth::session::{CurrentSession, Session},
    state::AppState,
};

pub fn tenant_routes() -> Router<AppState> {
    Router::new().route("/portfolio/:slug", get(get_portfolio))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/profiles", get(list_profiles))
        .route("/admin/profiles/:id", delete(delete_profile))
}

/// A session whose email is on the admin list. An empty list admits any
/// signed-in user.
pub struct AdminSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;
        let config = &state.config;
        if !config.admin_emails.is_empty() && !config.lists_admin(&session.email) {
            warn!(email = %session.email, "non-admin session on admin route");
            return Err((StatusCode::FORBIDDEN, "Admin access required".into()));
        }
        Ok(AdminSession(session))
    }
}

#[instrument(skip(state))]
pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublicProfile>, (StatusCode, String)> {
    match state.profiles.find_by_subdomain(&slug.to_ascii_lowercase()).await {
        Ok(Some(profile)) => Ok(Json(profile.into())),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Portfolio not found".into())),
        Err(e) => Err(internal(e)),
    }
}

#[instrument(skip(state, admin))]
pub async fn list_profiles(
    State(state): State<AppState>,
    admin: AdminSession,
) -> Result<Json<Vec<AdminProfileItem>>, (StatusCode, String)> {
    let profiles = state.profiles.list().await.map_err(internal)?;
    debug!(by = %admin.0.email, count = profiles.len(), "admin listed profiles");
    Ok(Json(profiles.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, admin))]
pub async fn delete_profile(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if !state.profiles.delete(id).await.map_err(internal)? {
        return Err((StatusCode::NOT_FOUND, "Profile not found".into()));
    }
    info!(%id, by = %admin.0.email, "profile deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "profile store failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Database error".into())
}
