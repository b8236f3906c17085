//! IP Rotator - Validated Proxy Pool for a Single Target
//!
//! Scrapes candidate proxies from free proxy list sites, probes each one
//! against the target URL, and serves working proxies at random while
//! gathering continues in the background.
//!
//! ```no_run
//! use ip_rotator::{RotatorConfig, Rotator};
//!
//! # async fn demo() -> ip_rotator::Result<()> {
//! let rotator = Rotator::builtin(RotatorConfig::new("https://example.com"))?;
//! rotator.start();
//! rotator.wait_until_finished().await;
//! let proxy = rotator.pull_proxy_url()?;
//! # let _ = proxy;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gatherer;
pub mod logging;
pub mod pool;
pub mod proxy;
pub mod rotator;
pub mod source;

pub use config::{BootstrapProxy, RotatorConfig};
pub use error::{Result, RotatorError};
pub use gatherer::{render_status, GathererState, GathererStatus};
pub use logging::LogLevel;
pub use pool::ProxyPool;
pub use proxy::{ProxyCandidate, ProxyParser, ProxyScheme, ValidatedProxy};
pub use rotator::{Rotator, STATUS_LOOP_EXIT};
pub use source::{SourceFetcher, SourcePage, SourceRegistry};
