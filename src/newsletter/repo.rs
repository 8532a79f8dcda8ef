use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;

#[async_trait]
pub trait NewsletterRepo: Send + Sync {
    /// Idempotent: subscribing an address twice leaves one row.
    async fn subscribe(&self, email: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgNewsletterRepo {
    db: PgPool,
}

impl PgNewsletterRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NewsletterRepo for PgNewsletterRepo {
    async fn subscribe(&self, email: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO newsletter_subscribers (email)
            VALUES ($1)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(email)
        .execute(&self.db)
        .await
        .context("insert newsletter subscriber")?;
        Ok(())
    }
}
