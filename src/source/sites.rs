//! Built-in proxy list sites
//!
//! Every built-in site is a paginated HTML or text list, so one generic
//! fetcher covers them all: render the page URL, download it through the
//! bootstrap proxy, and hand the body to the parser.

use async_trait::async_trait;
use reqwest::{Client, Proxy as ReqwestProxy};
use tracing::debug;

use super::{SourceFetcher, SourcePage};
use crate::config::RotatorConfig;
use crate::error::{Result, RotatorError};
use crate::proxy::{ProxyParser, ProxyScheme};

/// Where a site lists its proxies and how it paginates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSpec {
    /// Source identifier
    pub name: String,
    /// Page URL; `{page}` is replaced by the 1-based page number and
    /// `{offset}` by the 0-based index of the first row on that page
    pub url_template: String,
    /// Scheme assumed for rows that do not state one
    pub scheme: ProxyScheme,
    /// Last page the site serves
    pub max_pages: u32,
    /// Rows per page, used for `{offset}`
    pub page_size: u32,
}

impl SiteSpec {
    pub fn new(name: &str, url_template: &str, scheme: ProxyScheme, max_pages: u32) -> Self {
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
            scheme,
            max_pages,
            page_size: 64,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_url(&self, page: u32) -> String {
        let offset = page.saturating_sub(1) * self.page_size;
        self.url_template
            .replace("{page}", &page.to_string())
            .replace("{offset}", &offset.to_string())
    }
}

/// Sites registered by [`super::SourceRegistry::builtin`]
pub fn builtin_sites() -> Vec<SiteSpec> {
    vec![
        SiteSpec::new(
            "hasdata.com",
            "https://hasdata.com/free-proxy-list",
            ProxyScheme::Http,
            1,
        ),
        SiteSpec::new(
            "freeproxy.world",
            "https://www.freeproxy.world/?type=&anonymity=&country=&speed=&port=&page={page}",
            ProxyScheme::Http,
            10,
        ),
        SiteSpec::new(
            "proxybros.com",
            "https://proxybros.com/free-proxy-list/{page}/",
            ProxyScheme::Http,
            10,
        ),
        SiteSpec::new(
            "advanced.name",
            "https://advanced.name/freeproxy?page={page}",
            ProxyScheme::Http,
            10,
        ),
        SiteSpec::new(
            "iproyal.com",
            "https://iproyal.com/free-proxy-list/?page={page}&entries=100",
            ProxyScheme::Http,
            10,
        ),
        SiteSpec::new(
            "hidemy.life",
            "https://hidemy.life/en/proxy-list-servers?start={offset}",
            ProxyScheme::Http,
            10,
        ),
    ]
}

/// Fetcher for one paginated list site
pub struct ListPageFetcher {
    site: SiteSpec,
    client: Client,
}

impl ListPageFetcher {
    /// Build a fetcher that reaches the site through the configured
    /// bootstrap proxy, if any
    pub fn new(site: SiteSpec, config: &RotatorConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .default_headers(config.header_map()?)
            .timeout(config.get_proxy_timeout);

        if let Some(proxy) = &config.proxy {
            let proxy = ReqwestProxy::all(proxy.url()).map_err(|e| {
                RotatorError::Configuration(format!("invalid bootstrap proxy: {}", e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            RotatorError::Configuration(format!("cannot build client for {}: {}", site.name, e))
        })?;

        Ok(Self { site, client })
    }

    pub fn site(&self) -> &SiteSpec {
        &self.site
    }
}

#[async_trait]
impl SourceFetcher for ListPageFetcher {
    fn name(&self) -> &str {
        &self.site.name
    }

    async fn fetch(&self, page: u32) -> Result<SourcePage> {
        if page == 0 || page > self.site.max_pages {
            return Ok(SourcePage::empty());
        }

        let url = self.site.page_url(page);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RotatorError::source_unavailable(&self.site.name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RotatorError::source_unavailable(
                &self.site.name,
                format!("HTTP status: {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RotatorError::source_unavailable(&self.site.name, e))?;

        let candidates = ProxyParser::parse_text(&body, self.site.scheme);
        let has_more = !candidates.is_empty() && page < self.site.max_pages;
        debug!(source = %self.site.name, page, found = candidates.len(), "page parsed");

        Ok(SourcePage::new(candidates, has_more))
    }
}
