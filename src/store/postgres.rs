//! Postgres-backed article store.
//!
//! The `news` table is created by the migrations under `migrations/`, which
//! run once at startup. `url` carries a unique constraint and inserts use
//! `ON CONFLICT (url) DO NOTHING`, so a duplicate link is never stored twice
//! even if two writers race past the existence check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument, warn};

use super::{NewsStore, StoreError};
use crate::config::StorageConfig;
use crate::models::Article;

#[derive(Debug, Clone)]
pub struct PgNewsStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct NewsRow {
    title: String,
    url: String,
    source: String,
    text: String,
    published_at: DateTime<Utc>,
}

impl From<NewsRow> for Article {
    fn from(row: NewsRow) -> Self {
        Article {
            title: row.title,
            link: row.url,
            source: row.source,
            text: row.text,
            published_at: row.published_at,
        }
    }
}

impl PgNewsStore {
    /// Connect to the database, retrying while it comes up.
    ///
    /// Makes up to `connect_attempts` attempts with `connect_backoff` between
    /// them, then gives up with [`StoreError::Unavailable`].
    #[instrument(level = "info", skip_all, fields(attempts = config.connect_attempts))]
    pub async fn connect(config: &StorageConfig) -> Result<Self, StoreError> {
        let url = config.url.as_deref().unwrap_or_default();
        let attempts = config.connect_attempts.max(1);

        let mut attempt = 1;
        loop {
            match PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!(attempt, "Connected to database");
                    return Ok(Self::from_pool(pool));
                }
                Err(source) if attempt >= attempts => {
                    return Err(StoreError::Unavailable { attempts, source });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Waiting for database connection");
                    tokio::time::sleep(config.connect_backoff()).await;
                    attempt += 1;
                }
            }
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl NewsStore for PgNewsStore {
    async fn exists(&self, link: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM news WHERE url = $1)")
            .bind(link)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert(&self, article: &Article) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO news (title, url, source, published_at, text) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (url) DO NOTHING",
        )
        .bind(&article.title)
        .bind(&article.link)
        .bind(&article.source)
        .bind(article.published_at)
        .bind(&article.text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest(&self, k: usize) -> Result<Vec<Article>, StoreError> {
        let limit = i64::try_from(k).unwrap_or(i64::MAX);
        let rows: Vec<NewsRow> = sqlx::query_as(
            "SELECT title, url, source, text, published_at FROM news \
             ORDER BY published_at DESC, id DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn get_by_link(&self, link: &str) -> Result<Option<Article>, StoreError> {
        let row: Option<NewsRow> = sqlx::query_as(
            "SELECT title, url, source, text, published_at FROM news WHERE url = $1",
        )
        .bind(link)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Article::from))
    }
}
