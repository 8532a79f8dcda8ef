use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
}

/// A project image and the form slot it was picked in. Empty slots are not
/// kept but still count, so `slot` indexes `project_titles`.
#[derive(Debug, Clone)]
pub struct ProjectPhoto {
    pub slot: usize,
    pub image: ImageUpload,
}

/// One onboarding form submission, as collected from the multipart body.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub full_name: String,
    pub email: String,
    pub profession: String,
    pub raw_bio: String,
    pub philosophy: Option<String>,
    pub profile_photo: Option<ImageUpload>,
    pub project_photos: Vec<ProjectPhoto>,
    /// One per form slot; blanks fall back to "Project N".
    pub project_titles: Vec<String>,
    pub subscribe_newsletter: bool,
}

#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub subdomain: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub is_pro: bool,
}
