//! Domain → adapter dispatch.
//!
//! The registry is built once at startup and shared read-only with every
//! collection task; it is never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{Adapter, HttpFetcher, finmarket, investing, tradingview};

/// Maps a source's domain to the adapter responsible for it.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in site adapter, all sharing `fetcher`.
    pub fn with_site_adapters(fetcher: HttpFetcher) -> Self {
        Self::new()
            .with_adapter(
                investing::DOMAIN,
                Arc::new(investing::InvestingAdapter::new(fetcher.clone())),
            )
            .with_adapter(
                finmarket::DOMAIN,
                Arc::new(finmarket::FinmarketAdapter::new(fetcher.clone())),
            )
            .with_adapter(
                tradingview::DOMAIN,
                Arc::new(tradingview::TradingViewAdapter::new(fetcher)),
            )
    }

    /// Register `adapter` for `domain`, replacing any previous one.
    pub fn with_adapter(mut self, domain: impl Into<String>, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.insert(domain.into(), adapter);
        self
    }

    /// Look up the adapter for `domain`.
    pub fn resolve(&self, domain: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(domain).cloned()
    }

    /// Registered domains, sorted.
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        domains.sort_unstable();
        domains
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("domains", &self.domains())
            .finish()
    }
}
