//! Site adapters for the news sources polled each cycle.
//!
//! Every source is handled by an [`Adapter`] picked by the domain of its
//! listing URL through the [`AdapterRegistry`]. Adapters follow the same
//! two-phase pattern:
//!
//! 1. **Listing**: fetch the source's index page and extract [`ListingEntry`]
//!    digests (title, absolute link, publisher, resolved timestamp)
//! 2. **Article**: fetch each entry's page and extract the body text into an
//!    [`Article`]
//!
//! # Supported Sources
//!
//! | Domain | Module | Notes |
//! |--------|--------|-------|
//! | `ru.investing.com` | [`investing`] | Relative ("5 минут назад") and short dates |
//! | `www.finmarket.ru` | [`finmarket`] | Windows-1251 pages, long Russian dates |
//! | `ru.tradingview.com` | [`tradingview`] | RFC 2822 `event-time` attributes |
//!
//! Fetching goes through the shared [`HttpFetcher`], which applies the
//! per-request timeout. Extraction is synchronous: parsed documents never live
//! across an `.await`.

use async_trait::async_trait;
use scraper::ElementRef;
use thiserror::Error;

use crate::models::{Article, ListingEntry};
use crate::utils::squash_whitespace;

pub mod dates;
pub mod fetch;
pub mod finmarket;
pub mod investing;
pub mod registry;
pub mod tradingview;

pub use fetch::HttpFetcher;
pub use registry::AdapterRegistry;

/// Errors produced while fetching or extracting a source.
///
/// All of them are source-level failures: the pipeline logs them and drops
/// the rest of that source's contribution for the cycle.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The request never produced a response (DNS, TLS, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("{url} answered with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The page did not have the expected structure.
    #[error("unexpected page structure: {0}")]
    Parse(String),

    /// A date string could not be resolved to a single timestamp.
    #[error("unrecognised date {0:?}")]
    Date(String),
}

/// The capability a source needs to take part in a collection cycle.
///
/// `extract_listing` must only return entries with absolute links and fully
/// resolved timestamps; anything it cannot resolve is dropped there.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Fetch the raw page at `url`. Non-2xx responses are errors.
    async fn fetch_raw(&self, url: &str) -> Result<String, AdapterError>;

    /// Extract article digests from a listing page.
    fn extract_listing(&self, content: &str) -> Result<Vec<ListingEntry>, AdapterError>;

    /// Extract the full article from its page.
    fn extract_article(&self, content: &str, entry: &ListingEntry)
    -> Result<Article, AdapterError>;
}

/// Whitespace-normalised text of an element and its descendants.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    squash_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Join non-empty paragraph texts, one per line.
pub(crate) fn join_paragraphs<'a>(
    paragraphs: impl Iterator<Item = ElementRef<'a>>,
) -> String {
    paragraphs
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
