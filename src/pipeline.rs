//! One collection cycle: fan out over sources, funnel, dedup, persist.
//!
//! # Stages
//!
//! 1. One task per configured source URL, spawned fresh each cycle
//! 2. Each task resolves the URL's domain to an [`Adapter`], fetches and
//!    extracts the listing, then expands entries into articles in listing
//!    order (at most `article_concurrency` article fetches in flight)
//! 3. Finished tasks hand their articles to a shared funnel channel
//! 4. After every task has joined, the funnel is drained and each article is
//!    checked against the store by link and inserted if new, one at a time
//!
//! Source-level failures (no domain, no adapter, fetch or parse errors) are
//! logged and only cost that source its contribution. A storage failure in
//! stage 4 aborts the cycle with a [`CycleError`].

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::models::{Article, ListingEntry};
use crate::scrapers::{Adapter, AdapterError, AdapterRegistry};
use crate::store::{NewsStore, StoreError};
use crate::utils::{domain_of, truncate_for_log};

/// Storage failures that end a cycle early.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("checking whether {link} is stored failed: {source}")]
    Exists {
        link: String,
        #[source]
        source: StoreError,
    },

    #[error("storing {link} failed: {source}")]
    Insert {
        link: String,
        #[source]
        source: StoreError,
    },
}

/// What a completed cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Sources attempted.
    pub sources: usize,
    /// Articles that reached the funnel.
    pub collected: usize,
    /// Articles newly written to the store.
    pub persisted: usize,
    /// Articles skipped because their link was already stored.
    pub already_stored: usize,
}

/// Drives collection cycles over a fixed list of sources.
pub struct Pipeline {
    registry: Arc<AdapterRegistry>,
    store: Arc<dyn NewsStore>,
    sources: Vec<String>,
    article_concurrency: usize,
}

impl Pipeline {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        store: Arc<dyn NewsStore>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            registry,
            store,
            sources,
            article_concurrency: 1,
        }
    }

    /// Allow up to `n` article fetches per source at once (minimum 1).
    pub fn with_article_concurrency(mut self, n: usize) -> Self {
        self.article_concurrency = n.max(1);
        self
    }

    /// Run one full cycle.
    ///
    /// # Errors
    ///
    /// Only storage failures surface here; everything a source can do wrong
    /// is logged and absorbed.
    #[instrument(level = "info", skip_all, fields(sources = self.sources.len()))]
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let (funnel, mut drain) = mpsc::unbounded_channel::<Article>();
        let mut tasks = JoinSet::new();

        for url in &self.sources {
            let registry = Arc::clone(&self.registry);
            let funnel = funnel.clone();
            let url = url.clone();
            let concurrency = self.article_concurrency;
            tasks.spawn(async move {
                for article in collect_source(&registry, &url, concurrency).await {
                    // The receiver lives until every task has joined.
                    let _ = funnel.send(article);
                }
            });
        }
        drop(funnel);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Source task panicked; its articles are lost");
            }
        }

        let mut articles = Vec::new();
        while let Some(article) = drain.recv().await {
            articles.push(article);
        }

        let mut report = CycleReport {
            sources: self.sources.len(),
            collected: articles.len(),
            ..CycleReport::default()
        };

        for article in &articles {
            let stored = self
                .store
                .exists(&article.link)
                .await
                .map_err(|source| CycleError::Exists {
                    link: article.link.clone(),
                    source,
                })?;
            if stored {
                report.already_stored += 1;
                continue;
            }

            self.store
                .insert(article)
                .await
                .map_err(|source| CycleError::Insert {
                    link: article.link.clone(),
                    source,
                })?;
            debug!(
                link = %article.link,
                title = %truncate_for_log(&article.title, 80),
                "Stored article"
            );
            report.persisted += 1;
        }

        info!(
            sources = report.sources,
            collected = report.collected,
            persisted = report.persisted,
            already_stored = report.already_stored,
            "Collection cycle finished"
        );
        Ok(report)
    }
}

/// Everything one source contributes to a cycle. Never fails: problems are
/// logged and the articles gathered so far are returned.
#[instrument(level = "info", skip_all, fields(%url))]
async fn collect_source(
    registry: &AdapterRegistry,
    url: &str,
    concurrency: usize,
) -> Vec<Article> {
    let Some(domain) = domain_of(url) else {
        warn!("Source URL has no domain; skipping");
        return Vec::new();
    };
    let Some(adapter) = registry.resolve(&domain) else {
        warn!(%domain, "No adapter registered for domain; skipping");
        return Vec::new();
    };

    let entries = match fetch_listing(adapter.as_ref(), url).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(adapter = adapter.name(), error = %e, "Listing failed; skipping source");
            return Vec::new();
        }
    };
    debug!(adapter = adapter.name(), count = entries.len(), "Listing extracted");

    let mut articles = Vec::with_capacity(entries.len());
    let mut expansions = stream::iter(entries)
        .map(|entry| {
            let adapter = Arc::clone(&adapter);
            async move { expand(adapter.as_ref(), entry).await }
        })
        .buffered(concurrency);

    while let Some(expanded) = expansions.next().await {
        match expanded {
            Ok(article) => articles.push(article),
            Err(e) => {
                warn!(
                    adapter = adapter.name(),
                    kept = articles.len(),
                    error = %e,
                    "Article failed; dropping the rest of this source"
                );
                break;
            }
        }
    }

    info!(count = articles.len(), "Source collected");
    articles
}

async fn fetch_listing(
    adapter: &dyn Adapter,
    url: &str,
) -> Result<Vec<ListingEntry>, AdapterError> {
    let content = adapter.fetch_raw(url).await?;
    adapter.extract_listing(&content)
}

async fn expand(adapter: &dyn Adapter, entry: ListingEntry) -> Result<Article, AdapterError> {
    let content = adapter.fetch_raw(&entry.link).await?;
    adapter.extract_article(&content, &entry)
}
