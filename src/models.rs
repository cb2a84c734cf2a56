//! Data models for scraped news.
//!
//! This module defines the two record shapes that flow through a collection
//! cycle:
//! - [`ListingEntry`]: a lightweight reference to an article found on a
//!   source's index page
//! - [`Article`]: the full record that is deduplicated by `link` and persisted
//!
//! Both are plain owned values. A `ListingEntry` never leaves the task that
//! scraped it; an `Article` becomes durable only when its `link` is not already
//! in the store, and is never updated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A digest of an article as it appears on a source's listing page.
///
/// Produced by an adapter's listing extraction. The `link` is always an
/// absolute URL and `published_at` is fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Headline as shown on the listing page.
    pub title: String,
    /// Absolute URL of the full article.
    pub link: String,
    /// Publisher label (provider name or site domain).
    pub source: String,
    /// Publication time resolved by the adapter.
    pub published_at: DateTime<Utc>,
}

/// A fully scraped article, the unit of persistence.
///
/// `link` is the natural key: two articles with the same link are the same
/// article regardless of any other field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Headline.
    pub title: String,
    /// Absolute URL, unique across the store.
    pub link: String,
    /// Publisher label.
    pub source: String,
    /// Extracted body text, one paragraph per line.
    pub text: String,
    /// Publication time, used for newest-first ordering.
    pub published_at: DateTime<Utc>,
}

impl Article {
    /// Build an article from its listing entry and the extracted body text.
    pub fn from_entry(entry: &ListingEntry, text: String) -> Self {
        Self {
            title: entry.title.clone(),
            link: entry.link.clone(),
            source: entry.source.clone(),
            text,
            published_at: entry.published_at,
        }
    }
}
