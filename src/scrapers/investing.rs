//! ru.investing.com news adapter.
//!
//! The listing page renders one card per story. Each card carries the title
//! link, the provider name and a `<time>` element that holds either a relative
//! time ("15 минут назад") or a short date ("12 янв. 2024").
//!
//! # URL Pattern
//!
//! Story links may be relative (`/news/stock-market-news/...`); they are
//! resolved against `https://ru.investing.com`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{Adapter, AdapterError, HttpFetcher, dates, element_text, join_paragraphs};
use crate::models::{Article, ListingEntry};

/// Host this adapter is registered for.
pub const DOMAIN: &str = "ru.investing.com";

static BASE_URL: Lazy<Url> = Lazy::new(|| Url::parse("https://ru.investing.com").unwrap());
static CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[class='block w-full sm:flex-1 ']").unwrap());
static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[data-test='article-title-link']").unwrap());
static PROVIDER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span[data-test='news-provider-name']").unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time.ml-2").unwrap());
static BODY_PARAGRAPH: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.article_container p").unwrap());

/// Adapter for ru.investing.com.
#[derive(Debug, Clone)]
pub struct InvestingAdapter {
    fetcher: HttpFetcher,
}

impl InvestingAdapter {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    /// Listing extraction with relative times resolved against `now`.
    pub fn parse_listing(
        &self,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ListingEntry>, AdapterError> {
        let document = Html::parse_document(content);
        let mut cards = document.select(&CARD).peekable();
        if cards.peek().is_none() {
            return Err(AdapterError::Parse(
                "no news cards on investing.com listing".to_string(),
            ));
        }

        let mut entries = Vec::new();
        for card in cards {
            let Some(anchor) = card.select(&TITLE_LINK).next() else {
                warn!("Listing card without a title link");
                continue;
            };
            let Some(href) = anchor.value().attr("href") else {
                warn!(title = %element_text(anchor), "News link not found");
                continue;
            };
            let link = match BASE_URL.join(href) {
                Ok(link) => link.to_string(),
                Err(e) => {
                    warn!(%href, error = %e, "Unresolvable news link");
                    continue;
                }
            };

            let time_text = card.select(&TIME).next().map(element_text).unwrap_or_default();
            let published_at = match dates::parse_listing_time(&time_text, now) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(%link, error = %e, "Skipping entry with unresolved date");
                    continue;
                }
            };

            let source = card
                .select(&PROVIDER)
                .next()
                .map(element_text)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DOMAIN.to_string());

            entries.push(ListingEntry {
                title: element_text(anchor),
                link,
                source,
                published_at,
            });
        }

        debug!(count = entries.len(), "Parsed investing.com listing");
        Ok(entries)
    }
}

#[async_trait]
impl Adapter for InvestingAdapter {
    fn name(&self) -> &str {
        "investing"
    }

    async fn fetch_raw(&self, url: &str) -> Result<String, AdapterError> {
        self.fetcher.fetch(url).await
    }

    #[instrument(level = "debug", skip_all)]
    fn extract_listing(&self, content: &str) -> Result<Vec<ListingEntry>, AdapterError> {
        self.parse_listing(content, Utc::now())
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    const LISTING: &str = r#"
        <html><body>
          <ul>
            <li><div class="block w-full sm:flex-1 ">
              <a data-test="article-title-link" href="/news/stock-market-news/article-2301">
                Индекс Мосбиржи  вырос
              </a>
              <span data-test="news-provider-name">Investing.com</span>
              <time class="ml-2">15 минут назад</time>
            </div></li>
            <li><div class="block w-full sm:flex-1 ">
              <a data-test="article-title-link" href="https://ru.investing.com/news/economy/article-2299">Рубль укрепился</a>
              <span data-test="news-provider-name"></span>
              <time class="ml-2">12 янв. 2024</time>
            </div></li>
            <li><div class="block w-full sm:flex-1 ">
              <a data-test="article-title-link" href="/news/economy/article-2298">Без даты</a>
              <time class="ml-2">вчера</time>
            </div></li>
            <li><div class="block w-full sm:flex-1 ">
              <span data-test="news-provider-name">Reuters</span>
            </div></li>
          </ul>
        </body></html>
    "#;

    fn adapter() -> InvestingAdapter {
        InvestingAdapter::new(HttpFetcher::new(Duration::from_secs(1), "test").unwrap())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_listing_resolves_links_and_times() {
        let entries = adapter().parse_listing(LISTING, now()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Индекс Мосбиржи вырос");
        assert_eq!(
            entries[0].link,
            "https://ru.investing.com/news/stock-market-news/article-2301"
        );
        assert_eq!(entries[0].source, "Investing.com");
        assert_eq!(
            entries[0].published_at,
            Utc.with_ymd_and_hms(2024, 3, 10, 11, 45, 0).unwrap()
        );

        assert_eq!(
            entries[1].link,
            "https://ru.investing.com/news/economy/article-2299"
        );
        // Empty provider falls back to the site's domain.
        assert_eq!(entries[1].source, "ru.investing.com");
        assert_eq!(
            entries[1].published_at,
            Utc.with_ymd_and_hms(2024, 1, 11, 21, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_listing_without_cards_is_a_parse_error() {
        let err = adapter()
            .parse_listing("<html><body><p>Access denied</p></body></html>", now())
            .unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
    }

    #[test]
    fn test_extract_article_joins_paragraphs() {
        let page = r#"
            <div class="article_container">
              <p>Первый абзац.</p>
              <p></p>
              <p>Второй   абзац.</p>
            </div>
            <p>Реклама</p>
        "#;
        let entry = ListingEntry {
            title: "t".to_string(),
            link: "https://ru.investing.com/news/1".to_string(),
            source: "Investing.com".to_string(),
            published_at: now(),
        };

        let article = adapter().extract_article(page, &entry).unwrap();
        assert_eq!(article.text, "Первый абзац.\nВторой абзац.");
        assert_eq!(article.link, entry.link);
        assert_eq!(article.published_at, now());
    }
}
