//! In-process doubles for adapters and storage used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Article, ListingEntry};
use crate::scrapers::{Adapter, AdapterError};
use crate::store::{MemoryStore, NewsStore, StoreError};

/// Adapter serving canned pages.
///
/// Listing pages are one entry per line, `title|link|rfc3339`. A listing
/// page containing `BROKEN` fails to parse. Article pages are returned as
/// the article text verbatim. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    pages: HashMap<String, String>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }

    /// Listing page at `url` with `(title, link, rfc3339)` entries.
    pub fn listing(self, url: &str, entries: &[(&str, &str, &str)]) -> Self {
        let content = entries
            .iter()
            .map(|(title, link, ts)| format!("{title}|{link}|{ts}"))
            .collect::<Vec<_>>()
            .join("\n");
        self.page(url, &content)
    }

    /// Sleep this long before answering every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_raw(&self, url: &str) -> Result<String, AdapterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| AdapterError::Status {
                url: url.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            })
    }

    fn extract_listing(&self, content: &str) -> Result<Vec<ListingEntry>, AdapterError> {
        if content.contains("BROKEN") {
            return Err(AdapterError::Parse("scripted listing is broken".to_string()));
        }
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut parts = line.trim().splitn(3, '|');
                let (Some(title), Some(link), Some(ts)) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(AdapterError::Parse(format!("bad listing line {line:?}")));
                };
                let published_at = DateTime::parse_from_rfc3339(ts)
                    .map_err(|_| AdapterError::Date(ts.to_string()))?
                    .with_timezone(&Utc);
                Ok(ListingEntry {
                    title: title.to_string(),
                    link: link.to_string(),
                    source: "scripted".to_string(),
                    published_at,
                })
            })
            .collect()
    }

    fn extract_article(
        &self,
        content: &str,
        entry: &ListingEntry,
    ) -> Result<Article, AdapterError> {
        Ok(Article::from_entry(entry, content.to_string()))
    }
}

/// [`MemoryStore`] wrapper that counts calls and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    exists_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    fail_exists: AtomicBool,
    fail_insert: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn fail_exists(&self, fail: bool) {
        self.fail_exists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NewsStore for RecordingStore {
    async fn exists(&self, link: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exists.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.exists(link).await
    }

    async fn insert(&self, article: &Article) -> Result<(), StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.insert(article).await
    }

    async fn latest(&self, k: usize) -> Result<Vec<Article>, StoreError> {
        self.inner.latest(k).await
    }

    async fn get_by_link(&self, link: &str) -> Result<Option<Article>, StoreError> {
        self.inner.get_by_link(link).await
    }
}

/// A fixed article, `hour` o'clock on 2024-01-01 UTC.
pub fn article(link: &str, hour: u32) -> Article {
    use chrono::TimeZone;

    Article {
        title: format!("title {link}"),
        link: link.to_string(),
        source: "test".to_string(),
        text: format!("text {link}"),
        published_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
    }
}
