//! Read-only access to stored articles for the HTTP layer.

use std::sync::Arc;

use crate::models::Article;
use crate::store::{NewsStore, StoreError};

/// Page size used when the caller gives none, or a useless one.
pub const DEFAULT_LIMIT: i64 = 10;

/// Interpret a raw `limit` query parameter.
///
/// Missing, non-numeric and non-positive values all fall back to
/// [`DEFAULT_LIMIT`].
pub fn parse_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|&k| k > 0)
        .unwrap_or(DEFAULT_LIMIT)
}

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn NewsStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self { store }
    }

    /// The `k` most recently published articles, newest first.
    ///
    /// `k <= 0` is treated as [`DEFAULT_LIMIT`]. Never returns more than the
    /// store holds.
    pub async fn get_latest(&self, k: i64) -> Result<Vec<Article>, StoreError> {
        let k = if k <= 0 { DEFAULT_LIMIT } else { k };
        let k = usize::try_from(k).unwrap_or(usize::MAX);
        self.store.latest(k).await
    }

    pub async fn get_by_link(&self, link: &str) -> Result<Option<Article>, StoreError> {
        self.store.get_by_link(link).await
    }
}
