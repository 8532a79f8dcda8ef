use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, error, instrument};

use super::{
    dto::{
        ImageUpload, IntakeResponse, ProjectPhoto, Submission, SubscriptionQuery,
        SubscriptionResponse,
    },
    services::{submit_portfolio, IntakeError},
};
use crate::{
    auth::{services::normalize_email, session::CurrentSession},
    state::AppState,
};

const INTAKE_BODY_LIMIT: usize = 30 * 1024 * 1024;

pub fn intake_routes() -> Router<AppState> {
    Router::new()
        .route("/intake", post(submit))
        .route("/intake/subscription", get(subscription))
        .layer(DefaultBodyLimit::max(INTAKE_BODY_LIMIT))
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = match &self {
            IntakeError::Validation(_) => StatusCode::BAD_REQUEST,
            IntakeError::Conflict => StatusCode::CONFLICT,
            IntakeError::Forbidden => StatusCode::FORBIDDEN,
            IntakeError::Upload(_) | IntakeError::Rewrite(_) => StatusCode::BAD_GATEWAY,
            IntakeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// POST /intake (multipart)
#[instrument(skip(state, owner, mp))]
pub async fn submit(
    State(state): State<AppState>,
    CurrentSession(owner): CurrentSession,
    mp: Multipart,
) -> Result<Response, IntakeError> {
    let submission = read_submission(mp).await?;
    let published = submit_portfolio(&state, &owner, submission).await?;

    debug!(profile_id = %published.profile.id, "intake stored");
    let location = format!("/portfolio/{}", published.subdomain);
    let body = IntakeResponse {
        url: state.config.tenant_url(&published.subdomain),
        subdomain: published.subdomain,
    };
    let mut res = (StatusCode::CREATED, Json(body)).into_response();
    if let Ok(v) = HeaderValue::from_str(&location) {
        res.headers_mut().insert(header::LOCATION, v);
    }
    Ok(res)
}

/// GET /intake/subscription?email=
#[instrument(skip(state))]
pub async fn subscription(
    State(state): State<AppState>,
    Query(q): Query<SubscriptionQuery>,
) -> Result<Json<SubscriptionResponse>, (StatusCode, String)> {
    let email = normalize_email(&q.email);
    if email.is_empty() {
        return Ok(Json(SubscriptionResponse { is_pro: false }));
    }
    let profile = state.profiles.find_by_email(&email).await.map_err(|e| {
        error!(error = %e, "subscription lookup failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
    })?;
    Ok(Json(SubscriptionResponse {
        is_pro: profile.is_some_and(|p| p.subscription_status.is_pro()),
    }))
}

async fn read_submission(mut mp: Multipart) -> Result<Submission, IntakeError> {
    let mut sub = Submission::default();
    let mut photo_slots = 0;
    while let Some(field) = mp.next_field().await.map_err(malformed)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "full_name" => sub.full_name = text(field).await?,
            "email" => sub.email = text(field).await?,
            "profession" => sub.profession = text(field).await?,
            "raw_bio" => sub.raw_bio = text(field).await?,
            "philosophy" => sub.philosophy = Some(text(field).await?),
            "subscribe_newsletter" => sub.subscribe_newsletter = is_checked(&text(field).await?),
            "project_titles" | "project_titles[]" => sub.project_titles.push(text(field).await?),
            "profile_photo" => sub.profile_photo = image(field).await?,
            "project_photos" | "project_photos[]" => {
                let slot = photo_slots;
                photo_slots += 1;
                if let Some(image) = image(field).await? {
                    sub.project_photos.push(ProjectPhoto { slot, image });
                }
            }
            _ => {}
        }
    }
    Ok(sub)
}

async fn text(field: Field<'_>) -> Result<String, IntakeError> {
    field.text().await.map_err(malformed)
}

/// Browsers send an empty part for an untouched file input.
async fn image(field: Field<'_>) -> Result<Option<ImageUpload>, IntakeError> {
    let content_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| "application/octet-stream".into());
    let body = field.bytes().await.map_err(malformed)?;
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(ImageUpload { body, content_type }))
}

fn is_checked(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "on" | "1")
}

fn malformed(e: axum::extract::multipart::MultipartError) -> IntakeError {
    IntakeError::Validation(format!("Malformed form data: {}", e.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::jwt::JwtKeys,
        profiles::repo_types::SubscriptionStatus,
        test_support::{profile_fixture, MemoryProfiles},
    };
    use axum::{body::Body, extract::FromRef};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_body(texts: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in texts {
            out.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, filename, data) in files {
            out.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        out
    }

    fn post_intake(body: Vec<u8>, token: Option<&str>) -> axum::http::Request<Body> {
        let mut req = axum::http::Request::builder()
            .method("POST")
            .uri("/intake")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(token) = token {
            req = req.header(header::COOKIE, format!("pe_session={token}"));
        }
        req.body(Body::from(body)).unwrap()
    }

    fn token_for(state: &AppState, email: &str) -> String {
        JwtKeys::from_ref(state)
            .sign_access(Uuid::new_v4(), email)
            .unwrap()
    }

    fn aria_form() -> Vec<u8> {
        multipart_body(
            &[
                ("full_name", "Aria Chen"),
                ("email", "aria@studio.com"),
                ("profession", "Developer"),
                ("raw_bio", "I build things."),
            ],
            &[],
        )
    }

    async fn body_string(res: Response) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn multipart_submission_publishes() {
        let profiles = Arc::new(MemoryProfiles::default());
        let mut state = AppState::fake();
        state.profiles = profiles.clone();
        let token = token_for(&state, "aria@studio.com");
        // First file input left empty; its title slot still counts.
        let body = multipart_body(
            &[
                ("full_name", "Aria Chen"),
                ("email", "aria@studio.com"),
                ("profession", "Developer"),
                ("raw_bio", "I build things."),
                ("project_titles[]", "First"),
                ("project_titles[]", "Second"),
            ],
            &[
                ("profile_photo", "me.png", &b"profile"[..]),
                ("project_photos[]", "", &b""[..]),
                ("project_photos[]", "p2.png", &b"project-2"[..]),
            ],
        );

        let res = intake_routes()
            .with_state(state)
            .oneshot(post_intake(body, Some(&token)))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()[header::LOCATION], "/portfolio/aria-chen");
        let json: serde_json::Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(json["subdomain"], "aria-chen");
        assert_eq!(json["url"], "https://aria-chen.example.com/");

        let stored = profiles.all();
        assert_eq!(stored[0].projects.len(), 1);
        assert_eq!(stored[0].projects[0].title, "Second");
        assert_eq!(
            stored[0].projects[0].img_url,
            "https://media.test/portfolios/aria-chen/projects/project-2"
        );
    }

    #[tokio::test]
    async fn incomplete_form_is_bad_request() {
        let state = AppState::fake();
        let token = token_for(&state, "aria@studio.com");
        let body = multipart_body(&[("full_name", "Aria Chen")], &[]);
        let res = intake_routes()
            .with_state(state)
            .oneshot(post_intake(body, Some(&token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(res).await, "All fields are required.");
    }

    #[tokio::test]
    async fn submission_without_session_is_unauthorized() {
        let res = intake_routes()
            .with_state(AppState::fake())
            .oneshot(post_intake(aria_form(), None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn submission_for_another_email_is_forbidden() {
        let profiles = Arc::new(MemoryProfiles::default());
        let mut state = AppState::fake();
        state.profiles = profiles.clone();
        let token = token_for(&state, "mallory@studio.com");

        let res = intake_routes()
            .with_state(state)
            .oneshot(post_intake(aria_form(), Some(&token)))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(profiles.writes(), 0);
    }

    #[tokio::test]
    async fn subscription_reports_pro_only_for_pro_rows() {
        let profiles = Arc::new(MemoryProfiles::default());
        profiles.seed(profile_fixture("pro@studio.com", "pro", SubscriptionStatus::Pro));
        profiles.seed(profile_fixture("late@studio.com", "late", SubscriptionStatus::PastDue));
        let mut state = AppState::fake();
        state.profiles = profiles;

        for (email, expected) in [
            ("PRO@studio.com", true),
            ("late@studio.com", false),
            ("nobody@studio.com", false),
        ] {
            let Json(res) = subscription(
                State(state.clone()),
                Query(SubscriptionQuery { email: email.into() }),
            )
            .await
            .unwrap();
            assert_eq!(res.is_pro, expected, "{email}");
        }
    }

    #[test]
    fn checkbox_values() {
        for v in ["true", "on", "1", " ON "] {
            assert!(is_checked(v), "{v}");
        }
        for v in ["", "false", "off", "yes"] {
            assert!(!is_checked(v), "{v}");
        }
    }

    #[test]
    fn error_statuses() {
        let cases = [
            (IntakeError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (IntakeError::Conflict, StatusCode::CONFLICT),
            (IntakeError::Forbidden, StatusCode::FORBIDDEN),
            (IntakeError::Upload("x".into()), StatusCode::BAD_GATEWAY),
            (IntakeError::Rewrite("x".into()), StatusCode::BAD_GATEWAY),
            (IntakeError::Store("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
