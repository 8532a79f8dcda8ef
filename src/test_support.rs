//! In-memory collaborators for handler and workflow tests.

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use anyhow::anyhow;
use axum::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    ai::BioWriter,
    auth::repo::{User, UserRepo},
    intake::dto::{ImageUpload, ProjectPhoto},
    newsletter::repo::NewsletterRepo,
    profiles::{
        repo::ProfileRepo,
        repo_types::{NewProfile, Profile, Project, StatusUpdate, SubscriptionStatus},
    },
    storage::StorageClient,
    store::StoreError,
};

pub fn image(tag: &str) -> ImageUpload {
    ImageUpload {
        body: Bytes::from(tag.to_string()),
        content_type: "image/png".into(),
    }
}

pub fn project_photo(slot: usize, tag: &str) -> ProjectPhoto {
    ProjectPhoto {
        slot,
        image: image(tag),
    }
}

pub fn profile_fixture(email: &str, subdomain: &str, status: SubscriptionStatus) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        email: email.into(),
        subdomain: subdomain.into(),
        full_name: "Fixture Person".into(),
        profession: "Designer".into(),
        raw_bio: "raw".into(),
        bio: Some("Polished.".into()),
        philosophy: None,
        profile_img: None,
        projects: vec![Project {
            title: "Project 1".into(),
            img_url: "https://media.test/p1".into(),
        }],
        subscription_status: status,
        billing_customer_id: None,
        billing_plan_id: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

/// Mirrors the Postgres repo: unique email and subdomain, upserts keep
/// billing fields.
#[derive(Default)]
pub struct MemoryProfiles {
    rows: Mutex<Vec<Profile>>,
    writes: AtomicUsize,
    status_updates: AtomicUsize,
    conflict_next: AtomicBool,
}

impl MemoryProfiles {
    pub fn seed(&self, profile: Profile) {
        self.rows.lock().unwrap().push(profile);
    }

    pub fn all(&self) -> Vec<Profile> {
        self.rows.lock().unwrap().clone()
    }

    /// Upserts attempted.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn status_updates(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }

    pub fn fail_next_upsert_with_conflict(&self) {
        self.conflict_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileRepo for MemoryProfiles {
    async fn upsert_by_email(&self, p: &NewProfile) -> Result<Profile, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.conflict_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Conflict("profiles_subdomain_key".into()));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|r| r.subdomain == p.subdomain && r.email != p.email)
        {
            return Err(StoreError::Conflict("profiles_subdomain_key".into()));
        }
        let existing = rows.iter().position(|r| r.email == p.email);
        let base = match existing {
            Some(idx) => rows.remove(idx),
            None => profile_fixture(&p.email, &p.subdomain, SubscriptionStatus::Free),
        };
        let profile = Profile {
            subdomain: p.subdomain.clone(),
            full_name: p.full_name.clone(),
            profession: p.profession.clone(),
            raw_bio: p.raw_bio.clone(),
            bio: Some(p.bio.clone()),
            philosophy: p.philosophy.clone(),
            profile_img: p.profile_img.clone(),
            projects: p.projects.clone(),
            ..base
        };
        rows.push(profile.clone());
        Ok(profile)
    }

    async fn update_status_by_email(
        &self,
        email: &str,
        update: &StatusUpdate,
    ) -> anyhow::Result<u64> {
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        let mut touched = 0;
        for row in self.rows.lock().unwrap().iter_mut().filter(|r| r.email == email) {
            row.subscription_status = update.status;
            row.billing_customer_id = update.billing_customer_id.clone();
            row.billing_plan_id = update.billing_plan_id.clone();
            touched += 1;
        }
        Ok(touched)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Profile>> {
        Ok(self.all().into_iter().find(|p| p.email == email))
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> anyhow::Result<Option<Profile>> {
        Ok(self.all().into_iter().find(|p| p.subdomain == subdomain))
    }

    async fn list(&self) -> anyhow::Result<Vec<Profile>> {
        let mut rows = self.all();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|p| p.id != id);
        Ok(rows.len() != before)
    }
}

/// Unique on email like the `users` table.
#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<Vec<User>>,
    conflict_next: AtomicBool,
}

impl MemoryUsers {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// The next `create` loses a race to a concurrent insert of the same email.
    pub fn fail_next_create_with_conflict(&self) {
        self.conflict_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepo for MemoryUsers {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if self.conflict_next.swap(false, Ordering::SeqCst) || rows.iter().any(|u| u.email == email)
        {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(user.clone());
        Ok(user)
    }
}

#[derive(Default)]
pub struct MemoryNewsletter {
    emails: Mutex<BTreeSet<String>>,
}

impl MemoryNewsletter {
    pub fn emails(&self) -> Vec<String> {
        self.emails.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl NewsletterRepo for MemoryNewsletter {
    async fn subscribe(&self, email: &str) -> anyhow::Result<()> {
        self.emails.lock().unwrap().insert(email.to_string());
        Ok(())
    }
}

/// Serves every upload from `https://media.test/{folder}/{body}` so tests
/// can predict URLs from the bytes they send.
#[derive(Default)]
pub struct FakeStorage {
    fail_on: Option<String>,
    delay: Option<Duration>,
    uploads: AtomicUsize,
}

impl FakeStorage {
    pub fn failing_on(tag: &str) -> Self {
        Self {
            fail_on: Some(tag.to_string()),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn upload(
        &self,
        folder: &str,
        body: Bytes,
        _content_type: &str,
    ) -> anyhow::Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let tag = String::from_utf8_lossy(&body).into_owned();
        if self.fail_on.as_deref() == Some(tag.as_str()) {
            return Err(anyhow!("media host rejected {tag}"));
        }
        Ok(format!("https://media.test/{folder}/{tag}"))
    }
}

pub struct FakeWriter {
    reply: Result<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeWriter {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying(text)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BioWriter for FakeWriter {
    async fn rewrite(&self, _raw_bio: &str, _profession: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}
