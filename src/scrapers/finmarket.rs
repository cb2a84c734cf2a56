//! www.finmarket.ru news adapter.
//!
//! Pages are served in Windows-1251. The listing groups stories inside
//! `div.ind_article` blocks where a `span.date` ("2 января 2024 года 15:04")
//! precedes the `div.title` links it applies to, so the date is carried
//! forward while walking the block's children in order.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{Adapter, AdapterError, HttpFetcher, dates, element_text};
use crate::models::{Article, ListingEntry};

/// Host this adapter is registered for.
pub const DOMAIN: &str = "www.finmarket.ru";

const SOURCE_LABEL: &str = "finmarket.ru";
const CHARSET: &str = "windows-1251";

static BASE_URL: Lazy<Url> = Lazy::new(|| Url::parse("https://www.finmarket.ru").unwrap());
static BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("div.ind_article").unwrap());
static DATE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.date").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.title").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("div.body").unwrap());

/// Adapter for www.finmarket.ru.
#[derive(Debug, Clone)]
pub struct FinmarketAdapter {
    fetcher: HttpFetcher,
}

impl FinmarketAdapter {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Adapter for FinmarketAdapter {
    fn name(&self) -> &str {
        "finmarket"
    }

    async fn fetch_raw(&self, url: &str) -> Result<String, AdapterError> {
        self.fetcher.fetch_with_charset(url, CHARSET).await
    }

    #[instrument(level = "debug", skip_all)]
    fn extract_listing(&self, content: &str) -> Result<Vec<ListingEntry>, AdapterError> {
        let document = Html::parse_document(content);
        let mut blocks = document.select(&BLOCK).peekable();
        if blocks.peek().is_none() {
            return Err(AdapterError::Parse(
                "no div.ind_article blocks on finmarket.ru listing".to_string(),
            ));
        }

        let mut entries = Vec::new();
        for block in blocks {
            let mut current_date = None;
            for child in block.children().filter_map(ElementRef::wrap) {
                if DATE.matches(&child) {
                    let raw = element_text(child);
                    current_date = match dates::parse_long_date(&raw) {
                        Ok(ts) => Some(ts),
                        Err(e) => {
                            warn!(error = %e, "Failed to parse finmarket date");
                            None
                        }
                    };
                } else if TITLE.matches(&child) {
                    for anchor in child.select(&LINK) {
                        let Some(href) = anchor.value().attr("href") else {
                            warn!("News link not found");
                            continue;
                        };
                        let Some(published_at) = current_date else {
                            warn!(%href, "Skipping entry without a preceding date");
                            continue;
                        };
                        let link = match BASE_URL.join(href) {
                            Ok(link) => link.to_string(),
                            Err(e) => {
                                warn!(%href, error = %e, "Unresolvable news link");
                                continue;
                            }
                        };
                        entries.push(ListingEntry {
                            title: element_text(anchor),
                            link,
                            source: SOURCE_LABEL.to_string(),
                            published_at,
                        });
                    }
                }
            }
        }

        debug!(count = entries.len(), "Parsed finmarket.ru listing");
        Ok(entries)
    }

    #[instrument(level = "debug", skip_all, fields(link = %entry.link))]
    fn extract_article(
        &self,
        content: &str,
        entry: &ListingEntry,
    ) -> Result<Article, AdapterError> {
        let document = Html::parse_document(content);
        let text = document
            .select(&BODY)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            debug!("Article body is empty");
        }
        Ok(Article::from_entry(entry, text))
    }
}
