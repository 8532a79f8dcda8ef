use anyhow::Context;
use axum::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{NewProfile, Profile, ProfileRow, StatusUpdate};
use crate::store::{unique_violation, StoreError};

/// Profile persistence. Emails are stored normalised; callers pass them
/// already lowercased.
#[async_trait]
pub trait ProfileRepo: Send + Sync {
    /// Inserts, or replaces the content of the row sharing `profile.email`.
    async fn upsert_by_email(&self, profile: &NewProfile) -> Result<Profile, StoreError>;
    /// Returns the number of rows touched; zero is not an error.
    async fn update_status_by_email(&self, email: &str, update: &StatusUpdate)
        -> anyhow::Result<u64>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Profile>>;
    async fn find_by_subdomain(&self, subdomain: &str) -> anyhow::Result<Option<Profile>>;
    async fn list(&self) -> anyhow::Result<Vec<Profile>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const PROFILE_COLUMNS: &str = "id, email, subdomain, full_name, profession, raw_bio, bio, \
     philosophy, profile_img, projects_json, subscription_status, billing_customer_id, \
     billing_plan_id, created_at";

#[derive(Clone)]
pub struct PgProfileRepo {
    db: PgPool,
}

impl PgProfileRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileRepo for PgProfileRepo {
    async fn upsert_by_email(&self, p: &NewProfile) -> Result<Profile, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO profiles
                (email, subdomain, full_name, profession, raw_bio, bio, philosophy,
                 profile_img, projects_json)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (email) DO UPDATE SET
                subdomain     = EXCLUDED.subdomain,
                full_name     = EXCLUDED.full_name,
                profession    = EXCLUDED.profession,
                raw_bio       = EXCLUDED.raw_bio,
                bio           = EXCLUDED.bio,
                philosophy    = EXCLUDED.philosophy,
                profile_img   = EXCLUDED.profile_img,
                projects_json = EXCLUDED.projects_json
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(&p.email)
            .bind(&p.subdomain)
            .bind(&p.full_name)
            .bind(&p.profession)
            .bind(&p.raw_bio)
            .bind(&p.bio)
            .bind(&p.philosophy)
            .bind(&p.profile_img)
            .bind(Json(&p.projects))
            .fetch_one(&self.db)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(constraint) => StoreError::Conflict(constraint),
                None => StoreError::Other(anyhow::Error::new(e).context("upsert profile")),
            })?;
        Ok(row.into())
    }

    async fn update_status_by_email(
        &self,
        email: &str,
        update: &StatusUpdate,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE profiles
               SET subscription_status = $2,
                   billing_customer_id = $3,
                   billing_plan_id     = $4
             WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(update.status.as_str())
        .bind(&update.billing_customer_id)
        .bind(&update.billing_plan_id)
        .execute(&self.db)
        .await
        .context("update subscription status")?;
        Ok(res.rows_affected())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find profile by email")?;
        Ok(row.map(Into::into))
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> anyhow::Result<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE subdomain = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(subdomain)
            .fetch_optional(&self.db)
            .await
            .context("find profile by subdomain")?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> anyhow::Result<Vec<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, ProfileRow>(&sql)
            .fetch_all(&self.db)
            .await
            .context("list profiles")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete profile")?;
        Ok(res.rows_affected() > 0)
    }
}
