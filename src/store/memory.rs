//! In-process article store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{NewsStore, StoreError};
use crate::models::Article;

/// Articles kept in insertion order behind an async lock.
///
/// Ties on `published_at` come back in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    articles: RwLock<Vec<Article>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn exists(&self, link: &str) -> Result<bool, StoreError> {
        Ok(self.articles.read().await.iter().any(|a| a.link == link))
    }

    async fn insert(&self, article: &Article) -> Result<(), StoreError> {
        let mut articles = self.articles.write().await;
        if !articles.iter().any(|a| a.link == article.link) {
            articles.push(article.clone());
        }
        Ok(())
    }

    async fn latest(&self, k: usize) -> Result<Vec<Article>, StoreError> {
        let mut articles = self.articles.read().await.clone();
        // Stable sort keeps insertion order among equal timestamps.
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        articles.truncate(k);
        Ok(articles)
    }

    async fn get_by_link(&self, link: &str) -> Result<Option<Article>, StoreError> {
        Ok(self
            .articles
            .read()
            .await
            .iter()
            .find(|a| a.link == link)
            .cloned())
    }
}
