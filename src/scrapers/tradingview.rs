//! ru.tradingview.com news adapter.
//!
//! Each story on the listing is an `a.card-DmjQR0Aa` whose `relative-time`
//! child carries an absolute RFC 2822 `event-time` attribute, so no relative
//! date resolution is needed here.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{Adapter, AdapterError, HttpFetcher, dates, element_text, join_paragraphs};
use crate::models::{Article, ListingEntry};

/// Host this adapter is registered for.
pub const DOMAIN: &str = "ru.tradingview.com";

static BASE_URL: Lazy<Url> = Lazy::new(|| Url::parse("https://ru.tradingview.com").unwrap());
static CARD: Lazy<Selector> = Lazy::new(|| Selector::parse("a.card-DmjQR0Aa").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.title-DmjQR0Aa").unwrap());
static PROVIDER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.provider-TUPxzdRV").unwrap());
static EVENT_TIME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("relative-time[event-time]").unwrap());
static BODY_PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("article p").unwrap());

/// Adapter for ru.tradingview.com.
#[derive(Debug, Clone)]
pub struct TradingViewAdapter {
    fetcher: HttpFetcher,
}

impl TradingViewAdapter {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Adapter for TradingViewAdapter {
    fn name(&self) -> &str {
        "tradingview"
    }

    async fn fetch_raw(&self, url: &str) -> Result<String, AdapterError> {
        self.fetcher.fetch(url).await
    }

    #[instrument(level = "debug", skip_all)]
    fn extract_listing(&self, content: &str) -> Result<Vec<ListingEntry>, AdapterError> {
        let document = Html::parse_document(content);
        let mut cards = document.select(&CARD).peekable();
        if cards.peek().is_none() {
            return Err(AdapterError::Parse(
                "no news cards on tradingview.com listing".to_string(),
            ));
        }

        let mut entries = Vec::new();
        for card in cards {
            let Some(href) = card.value().attr("href") else {
                warn!("News link not found");
                continue;
            };
            let link = match BASE_URL.join(href) {
                Ok(link) => link.to_string(),
                Err(e) => {
                    warn!(%href, error = %e, "Unresolvable news link");
                    continue;
                }
            };

            let event_time = card
                .select(&EVENT_TIME)
                .next()
                .and_then(|el| el.value().attr("event-time"))
                .unwrap_or_default();
            let published_at = match dates::parse_rfc2822(event_time) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(%link, error = %e, "Skipping entry with unresolved date");
                    continue;
                }
            };

            let title = card.select(&TITLE).next().map(element_text).unwrap_or_default();
            let source = card
                .select(&PROVIDER)
                .next()
                .map(element_text)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DOMAIN.to_string());

            entries.push(ListingEntry {
                title,
                link,
                source,
                published_at,
            });
        }

        debug!(count = entries.len(), "Parsed tradingview.com listing");
        Ok(entries)
    }

    #[instrument(level = "debug", skip_all, fields(link = %entry.link))]
    fn extract_article(
        &self,
        content: &str,
        entry: &ListingEntry,
    ) -> Result<Article, AdapterError> {
        let document = Html::parse_document(content);
        let text = join_paragraphs(document.select(&BODY_PARAGRAPH));
        if text.is_empty() {
            debug!("Article body is empty");
        }
        Ok(Article::from_entry(entry, text))
    }
}
