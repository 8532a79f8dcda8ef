use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key the write did not expect to collide on was already taken.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Postgres reports unique violations as SQLSTATE 23505.
pub fn unique_violation(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            Some(db.constraint().unwrap_or("unique").to_string())
        }
        _ => None,
    }
}
