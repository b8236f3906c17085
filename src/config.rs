//! Rotator configuration

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::error::{Result, RotatorError};
use crate::logging::LogLevel;
use crate::proxy::{ProbeTarget, ProxyCandidate, ProxyScheme};

/// Default number of consecutive fetch failures before a source fails
pub const DEFAULT_GET_PROXY_RETRY: u32 = 3;

/// Default per-operation timeout in seconds
pub const DEFAULT_GET_PROXY_TIMEOUT_SECS: u64 = 3;

const DEFAULT_PROBE_CONCURRENCY: usize = 16;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_SOURCE_DEADLINE: Duration = Duration::from_secs(300);
const DEFAULT_MAX_PAGES: u32 = 20;

/// Desktop browser header profile sent to the target and the sources
pub fn default_headers() -> BTreeMap<String, String> {
    [
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        ),
        ("accept-language", "en-US,en;q=0.6"),
        ("priority", "u=0, i"),
        (
            "sec-ch-ua",
            r#""Chromium";v="128", "Not;A=Brand";v="24", "Brave";v="128""#,
        ),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", r#""Linux""#),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "none"),
        ("sec-fetch-user", "?1"),
        ("sec-gpc", "1"),
        ("upgrade-insecure-requests", "1"),
        (
            "user-agent",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Proxy used to reach the sources themselves
///
/// Independent of the validated proxies, which are only used for the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapProxy(ProxyCandidate);

impl BootstrapProxy {
    /// Build from a `(host, port, scheme)` triple, port given as text or number
    pub fn parse(host: &str, port: impl ToString, scheme: &str) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(RotatorError::Configuration(format!(
                "invalid bootstrap proxy host: {:?}",
                host
            )));
        }
        let port_text = port.to_string();
        let port: u16 = port_text
            .trim()
            .parse()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                RotatorError::Configuration(format!("invalid bootstrap proxy port: {:?}", port_text))
            })?;
        let scheme: ProxyScheme = scheme.parse()?;
        Ok(Self(ProxyCandidate::new(host, port, scheme)))
    }

    pub fn host(&self) -> &str {
        &self.0.host
    }

    pub fn port(&self) -> u16 {
        self.0.port
    }

    pub fn scheme(&self) -> ProxyScheme {
        self.0.scheme
    }

    pub fn url(&self) -> String {
        self.0.url()
    }
}

impl TryFrom<ProxyCandidate> for BootstrapProxy {
    type Error = RotatorError;

    fn try_from(candidate: ProxyCandidate) -> Result<Self> {
        Self::parse(&candidate.host, candidate.port, candidate.scheme.as_str())
    }
}

/// Configuration for the rotator
#[derive(Debug, Clone)]
pub struct RotatorConfig {
    /// URL every candidate is validated against
    pub target_url: String,
    /// Optional proxy for reaching the sources
    pub proxy: Option<BootstrapProxy>,
    /// Header set sent with probes and source requests
    pub headers: BTreeMap<String, String>,
    /// Consecutive fetch failures tolerated before a source fails
    pub get_proxy_retry: u32,
    /// Per-operation timeout (one fetch, one probe)
    pub get_proxy_timeout: Duration,
    /// Log verbosity
    pub log_level: LogLevel,
    /// Simultaneous probes per source
    pub probe_concurrency: usize,
    /// Pause before re-requesting a page that failed
    pub retry_delay: Duration,
    /// Wall-clock budget for a whole source
    pub source_deadline: Duration,
    /// Page budget for a whole source
    pub max_pages: u32,
}

impl RotatorConfig {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            proxy: None,
            headers: default_headers(),
            get_proxy_retry: DEFAULT_GET_PROXY_RETRY,
            get_proxy_timeout: Duration::from_secs(DEFAULT_GET_PROXY_TIMEOUT_SECS),
            log_level: LogLevel::default(),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            retry_delay: DEFAULT_RETRY_DELAY,
            source_deadline: DEFAULT_SOURCE_DEADLINE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_proxy(mut self, proxy: BootstrapProxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Replace the header set entirely
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.get_proxy_retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.get_proxy_timeout = timeout;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = concurrency;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_source_deadline(mut self, deadline: Duration) -> Self {
        self.source_deadline = deadline;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Check everything that can be checked before any task runs
    pub fn validate(&self) -> Result<()> {
        self.parsed_target_url()?;
        self.header_map()?;
        if self.get_proxy_retry == 0 {
            return Err(RotatorError::Configuration(
                "get_proxy_retry must be at least 1".to_string(),
            ));
        }
        if self.get_proxy_timeout.is_zero() {
            return Err(RotatorError::Configuration(
                "get_proxy_timeout must be positive".to_string(),
            ));
        }
        if self.probe_concurrency == 0 || self.max_pages == 0 {
            return Err(RotatorError::Configuration(
                "probe_concurrency and max_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parsed_target_url(&self) -> Result<Url> {
        let url = Url::parse(&self.target_url)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(RotatorError::Configuration(format!(
                "target_url must be http or https, got {}",
                other
            ))),
        }
    }

    /// Headers as a reqwest map
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                RotatorError::Configuration(format!("invalid header name: {:?}", name))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                RotatorError::Configuration(format!("invalid value for header {}", name))
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    pub fn probe_target(&self) -> Result<ProbeTarget> {
        Ok(ProbeTarget::new(
            self.parsed_target_url()?,
            self.header_map()?,
            self.get_proxy_timeout,
        ))
    }
}
