use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

pub const MAX_PROJECTS_PRO: usize = 5;
pub const MAX_PROJECTS_FREE: usize = 1;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Free,
    Pro,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Free => "free",
            SubscriptionStatus::Pro => "pro",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Unknown column values read as `Free`, never as `Pro`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "pro" => SubscriptionStatus::Pro,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::Free,
        }
    }

    pub fn is_pro(self) -> bool {
        self == SubscriptionStatus::Pro
    }

    pub fn project_limit(self) -> usize {
        if self.is_pro() {
            MAX_PROJECTS_PRO
        } else {
            MAX_PROJECTS_FREE
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub title: String,
    pub img_url: String,
}

/// A published profile.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub subdomain: String,
    pub full_name: String,
    pub profession: String,
    pub raw_bio: String,
    pub bio: Option<String>,
    pub philosophy: Option<String>,
    pub profile_img: Option<String>,
    pub projects: Vec<Project>,
    pub subscription_status: SubscriptionStatus,
    pub billing_customer_id: Option<String>,
    pub billing_plan_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Everything the intake workflow writes in its single upsert. Billing
/// fields are absent on purpose: only the webhook touches them.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub subdomain: String,
    pub full_name: String,
    pub profession: String,
    pub raw_bio: String,
    pub bio: String,
    pub philosophy: Option<String>,
    pub profile_img: Option<String>,
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: SubscriptionStatus,
    pub billing_customer_id: Option<String>,
    pub billing_plan_id: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub subdomain: String,
    pub full_name: String,
    pub profession: String,
    pub raw_bio: String,
    pub bio: Option<String>,
    pub philosophy: Option<String>,
    pub profile_img: Option<String>,
    pub projects_json: Json<Vec<Project>>,
    pub subscription_status: String,
    pub billing_customer_id: Option<String>,
    pub billing_plan_id: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<ProfileRow> for Profile {
    fn from(r: ProfileRow) -> Self {
        Self {
            id: r.id,
            email: r.email,
            subdomain: r.subdomain,
            full_name: r.full_name,
            profession: r.profession,
            raw_bio: r.raw_bio,
            bio: r.bio,
            philosophy: r.philosophy,
            profile_img: r.profile_img,
            projects: r.projects_json.0,
            subscription_status: SubscriptionStatus::from_db(&r.subscription_status),
            billing_customer_id: r.billing_customer_id,
            billing_plan_id: r.billing_plan_id,
            created_at: r.created_at,
        }
    }
}
