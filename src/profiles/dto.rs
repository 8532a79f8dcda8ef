use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Profile, Project, SubscriptionStatus};

/// What a tenant page needs to render. No email, no billing data.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub subdomain: String,
    pub full_name: String,
    pub profession: String,
    pub bio: Option<String>,
    pub philosophy: Option<String>,
    pub profile_img: Option<String>,
    pub projects: Vec<Project>,
    pub is_pro: bool,
}

impl From<Profile> for PublicProfile {
    fn from(p: Profile) -> Self {
        Self {
            is_pro: p.subscription_status.is_pro(),
            subdomain: p.subdomain,
            full_name: p.full_name,
            profession: p.profession,
            bio: p.bio,
            philosophy: p.philosophy,
            profile_img: p.profile_img,
            projects: p.projects,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminProfileItem {
    pub id: Uuid,
    pub email: String,
    pub subdomain: String,
    pub full_name: String,
    pub profession: String,
    pub subscription_status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Profile> for AdminProfileItem {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            subdomain: p.subdomain,
            full_name: p.full_name,
            profession: p.profession,
            subscription_status: p.subscription_status,
            created_at: p.created_at,
        }
    }
}
