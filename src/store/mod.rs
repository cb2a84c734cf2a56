//! Durable article storage.
//!
//! [`NewsStore`] is the only shared mutable resource in the process. The
//! collection pipeline is its single writer (dedup check then insert, one
//! article at a time); the query service reads from it concurrently.
//!
//! # Backends
//!
//! - [`PgNewsStore`]: Postgres via `sqlx`, with a unique constraint on the
//!   article URL so a check-then-insert race can never store a duplicate
//! - [`MemoryStore`]: process-local, for development runs and tests

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Article;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgNewsStore;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("database unreachable after {attempts} attempts: {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
}

/// Operations the pipeline and the query service need from storage.
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Whether an article with this link is already stored.
    async fn exists(&self, link: &str) -> Result<bool, StoreError>;

    /// Store a new article. Inserting a link that is already present is a
    /// no-op, never a second row.
    async fn insert(&self, article: &Article) -> Result<(), StoreError>;

    /// Up to `k` articles, newest `published_at` first.
    async fn latest(&self, k: usize) -> Result<Vec<Article>, StoreError>;

    /// The article stored under `link`, if any.
    async fn get_by_link(&self, link: &str) -> Result<Option<Article>, StoreError>;
}
