//! Proxy list sources
//!
//! A source hands out candidates one page at a time. The gatherer owns the
//! retry and pagination policy; fetchers only report what one page held.

pub mod sites;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RotatorConfig;
use crate::error::{Result, RotatorError};
use crate::proxy::ProxyCandidate;

pub use sites::{builtin_sites, ListPageFetcher, SiteSpec};

/// One page of candidates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePage {
    pub candidates: Vec<ProxyCandidate>,
    pub has_more: bool,
}

impl SourcePage {
    pub fn new(candidates: Vec<ProxyCandidate>, has_more: bool) -> Self {
        Self {
            candidates,
            has_more,
        }
    }

    /// Final page with no candidates
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Retrieves candidate proxies from one external provider
///
/// `page` starts at 1. Unreachable providers and unparsable responses are
/// reported as [`RotatorError::SourceUnavailable`].
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Source identifier shown in status output
    fn name(&self) -> &str;

    async fn fetch(&self, page: u32) -> Result<SourcePage>;
}

/// Ordered set of sources a rotator gathers from
#[derive(Clone, Default)]
pub struct SourceRegistry {
    fetchers: Vec<Arc<dyn SourceFetcher>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in site, sharing the rotator's bootstrap
    /// proxy and header profile
    pub fn builtin(config: &RotatorConfig) -> Result<Self> {
        let mut registry = Self::new();
        for site in builtin_sites() {
            registry.register(Arc::new(ListPageFetcher::new(site, config)?));
        }
        Ok(registry)
    }

    pub fn register(&mut self, fetcher: Arc<dyn SourceFetcher>) -> &mut Self {
        self.fetchers.push(fetcher);
        self
    }

    pub fn with(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.register(fetcher);
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.fetchers.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// Reject registries where two fetchers share a name
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for fetcher in &self.fetchers {
            if !seen.insert(fetcher.name()) {
                return Err(RotatorError::Configuration(format!(
                    "duplicate source: {}",
                    fetcher.name()
                )));
            }
        }
        Ok(())
    }

    pub fn into_fetchers(self) -> Vec<Arc<dyn SourceFetcher>> {
        self.fetchers
    }
}
