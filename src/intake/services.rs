use std::time::Duration;

use futures_util::future::{try_join, try_join_all};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::dto::{ImageUpload, ProjectPhoto, Submission};
use crate::{
    auth::{
        services::{is_valid_email, normalize_email},
        session::Session,
    },
    config::AppConfig,
    profiles::{
        repo::ProfileRepo,
        repo_types::{NewProfile, Profile, Project, SubscriptionStatus},
    },
    state::AppState,
    storage::StorageClient,
    store::StoreError,
};

/// Leaves room for a `-xxxx` collision suffix inside one DNS label.
pub const MAX_SLUG_LEN: usize = 48;
const MAX_SLUG_ATTEMPTS: usize = 5;
const FALLBACK_SLUG: &str = "portfolio";
/// Slugs the host classifier would never route to a tenant.
const RESERVED_SLUGS: &[&str] = &["www"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Uploading,
    Rewriting,
    Persisting,
    Done,
    Failed,
}

impl Stage {
    pub fn can_advance_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Idle, Stage::Uploading)
                | (Stage::Uploading, Stage::Rewriting)
                | (Stage::Rewriting, Stage::Persisting)
                | (Stage::Persisting, Stage::Done)
                | (
                    Stage::Uploading | Stage::Rewriting | Stage::Persisting,
                    Stage::Failed
                )
        )
    }
}

/// Display strings are shown to the submitter as-is.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("{0}")]
    Validation(String),
    #[error("Image upload failed: {0}")]
    Upload(String),
    #[error("AI Polish failed: {0}")]
    Rewrite(String),
    #[error("A portfolio with this name or email already exists.")]
    Conflict,
    #[error("You can only publish a portfolio for the email you are signed in with.")]
    Forbidden,
    #[error("Database error: {0}")]
    Store(String),
}

#[derive(Debug, Clone)]
pub struct Published {
    pub subdomain: String,
    pub profile: Profile,
}

struct Run {
    stage: Stage,
    email: String,
}

impl Run {
    fn new(email: &str) -> Self {
        Self {
            stage: Stage::Idle,
            email: email.to_string(),
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal intake transition {:?} -> {:?}",
            self.stage,
            next
        );
        info!(email = %self.email, from = ?self.stage, to = ?next, "intake stage");
        self.stage = next;
    }
}

/// Runs one submission end to end: validate, check ownership, gate by tier,
/// upload media, polish the bio, then a single upsert keyed by email.
/// Nothing is written unless every earlier stage succeeded.
pub async fn submit_portfolio(
    st: &AppState,
    owner: &Session,
    submission: Submission,
) -> Result<Published, IntakeError> {
    let mut submission = validate(submission)?;
    authorize(&st.config, owner, &submission.email)?;

    let status = current_status(st.profiles.as_ref(), &submission.email).await?;
    apply_tier(&mut submission, status);

    let mut run = Run::new(&submission.email);
    let subscribe = submission.subscribe_newsletter;
    let email = submission.email.clone();

    match run_pipeline(st, &mut run, submission).await {
        Ok(published) => {
            run.advance(Stage::Done);
            if subscribe {
                if let Err(e) = st.newsletter.subscribe(&email).await {
                    warn!(error = %e, %email, "newsletter opt-in failed; submission kept");
                }
            }
            info!(%email, subdomain = %published.subdomain, "portfolio published");
            Ok(published)
        }
        Err(e) => {
            let failed_in = run.stage;
            run.advance(Stage::Failed);
            error!(error = %e, %email, stage = ?failed_in, "intake failed");
            Err(e)
        }
    }
}

async fn run_pipeline(
    st: &AppState,
    run: &mut Run,
    sub: Submission,
) -> Result<Published, IntakeError> {
    run.advance(Stage::Uploading);
    let base_slug = slugify(&sub.full_name);
    // Read-only; media folders are named after the slug that gets published.
    let subdomain = resolve_subdomain(st.profiles.as_ref(), &base_slug, &sub.email).await?;
    let upload_bound = Duration::from_secs(st.config.storage.upload_timeout_secs.max(1));
    let (profile_img, projects) = upload_media(
        st.storage.as_ref(),
        &subdomain,
        sub.profile_photo,
        sub.project_photos,
        &sub.project_titles,
        upload_bound,
    )
    .await?;

    run.advance(Stage::Rewriting);
    let rewrite_bound = Duration::from_secs(st.config.ai.timeout_secs.max(1));
    let bio = rewrite_bio(st, &sub.raw_bio, &sub.profession, rewrite_bound).await?;

    run.advance(Stage::Persisting);
    let record = NewProfile {
        email: sub.email,
        subdomain,
        full_name: sub.full_name,
        profession: sub.profession,
        raw_bio: sub.raw_bio,
        bio,
        philosophy: sub.philosophy,
        profile_img,
        projects,
    };
    let profile = st
        .profiles
        .upsert_by_email(&record)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(constraint) => {
                warn!(%constraint, "profile upsert hit a unique constraint");
                IntakeError::Conflict
            }
            StoreError::Other(e) => IntakeError::Store(e.to_string()),
        })?;

    Ok(Published {
        subdomain: profile.subdomain.clone(),
        profile,
    })
}

/// Normalises the text fields and rejects incomplete submissions before any
/// collaborator is touched.
pub fn validate(mut sub: Submission) -> Result<Submission, IntakeError> {
    sub.full_name = sub.full_name.trim().to_string();
    sub.email = normalize_email(&sub.email);
    sub.profession = sub.profession.trim().to_string();
    sub.raw_bio = sub.raw_bio.trim().to_string();
    sub.philosophy = sub
        .philosophy
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    if [&sub.full_name, &sub.email, &sub.profession, &sub.raw_bio]
        .iter()
        .any(|f| f.is_empty())
    {
        return Err(IntakeError::Validation("All fields are required.".into()));
    }
    if !is_valid_email(&sub.email) {
        return Err(IntakeError::Validation("Invalid email address.".into()));
    }
    Ok(sub)
}

/// A session publishes under its own email. Emails listed in `ADMIN_EMAILS`
/// may publish for anyone.
fn authorize(config: &AppConfig, owner: &Session, email: &str) -> Result<(), IntakeError> {
    let signed_in = normalize_email(&owner.email);
    if signed_in == email || config.lists_admin(&signed_in) {
        return Ok(());
    }
    warn!(session = %signed_in, submitted = %email, "intake for another account's email");
    Err(IntakeError::Forbidden)
}

async fn current_status(
    profiles: &dyn ProfileRepo,
    email: &str,
) -> Result<SubscriptionStatus, IntakeError> {
    profiles
        .find_by_email(email)
        .await
        .map(|p| p.map(|p| p.subscription_status).unwrap_or_default())
        .map_err(|e| IntakeError::Store(e.to_string()))
}

/// Enforces pro-only features regardless of what the form sent. Titles are
/// looked up by slot, so only the photos are clamped.
pub fn apply_tier(sub: &mut Submission, status: SubscriptionStatus) {
    if !status.is_pro() {
        sub.philosophy = None;
    }
    sub.project_photos.truncate(status.project_limit());
}

fn project_title(titles: &[String], slot: usize) -> String {
    titles
        .get(slot)
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Project {}", slot + 1))
}

/// Uploads run concurrently; each URL is matched back to its form slot.
async fn upload_media(
    storage: &dyn StorageClient,
    slug: &str,
    profile_photo: Option<ImageUpload>,
    project_photos: Vec<ProjectPhoto>,
    titles: &[String],
    bound: Duration,
) -> Result<(Option<String>, Vec<Project>), IntakeError> {
    let profile_folder = format!("portfolios/{slug}/profile");
    let project_folder = format!("portfolios/{slug}/projects");

    let profile_fut = async {
        match profile_photo {
            Some(img) => upload_one(storage, &profile_folder, img, bound).await.map(Some),
            None => Ok(None),
        }
    };
    let slots: Vec<usize> = project_photos.iter().map(|p| p.slot).collect();
    let projects_fut = try_join_all(
        project_photos
            .into_iter()
            .map(|p| upload_one(storage, &project_folder, p.image, bound)),
    );

    let (profile_img, urls) = try_join(profile_fut, projects_fut).await?;
    let projects = slots
        .into_iter()
        .zip(urls)
        .map(|(slot, img_url)| Project {
            title: project_title(titles, slot),
            img_url,
        })
        .collect();
    Ok((profile_img, projects))
}

async fn upload_one(
    storage: &dyn StorageClient,
    folder: &str,
    img: ImageUpload,
    bound: Duration,
) -> Result<String, IntakeError> {
    match timeout(bound, storage.upload(folder, img.body, &img.content_type)).await {
        Ok(Ok(url)) => Ok(url),
        Ok(Err(e)) => Err(IntakeError::Upload(format!("{e:#}"))),
        Err(_) => Err(IntakeError::Upload(format!(
            "timed out after {}s",
            bound.as_secs()
        ))),
    }
}

/// Strict: a failed, empty or timed-out rewrite fails the submission.
async fn rewrite_bio(
    st: &AppState,
    raw_bio: &str,
    profession: &str,
    bound: Duration,
) -> Result<String, IntakeError> {
    match timeout(bound, st.writer.rewrite(raw_bio, profession)).await {
        Ok(Ok(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Ok(Ok(_)) => Err(IntakeError::Rewrite("empty response".into())),
        Ok(Err(e)) => Err(IntakeError::Rewrite(e.to_string())),
        Err(_) => Err(IntakeError::Rewrite(format!(
            "timed out after {}s",
            bound.as_secs()
        ))),
    }
}

/// Lowercase ASCII slug: alphanumerics kept, whitespace, `-` and `_` become
/// single dashes, everything else is dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Picks the slug to publish under. A slug owned by another email, or a
/// reserved one, gets a short random suffix.
async fn resolve_subdomain(
    profiles: &dyn ProfileRepo,
    base: &str,
    email: &str,
) -> Result<String, IntakeError> {
    let mut candidate = base.to_string();
    for _ in 0..MAX_SLUG_ATTEMPTS {
        if RESERVED_SLUGS.contains(&candidate.as_str()) {
            candidate = with_suffix(base);
            continue;
        }
        match profiles.find_by_subdomain(&candidate).await {
            Ok(Some(owner)) if owner.email != email => {
                info!(slug = %candidate, "slug taken by another profile; adding suffix");
                candidate = with_suffix(base);
            }
            Ok(_) => return Ok(candidate),
            Err(e) => return Err(IntakeError::Store(e.to_string())),
        }
    }
    Err(IntakeError::Conflict)
}

fn with_suffix(base: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", base, &id[..4])
}
