//! Rotator façade
//!
//! Owns the configuration, the pool and one gatherer per source. Callers pull
//! proxies and watch progress; everything else runs in background tasks that
//! are aborted when the rotator is dropped.

use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::RotatorConfig;
use crate::error::Result;
use crate::gatherer::{render_status, GatherPolicy, Gatherer, GathererState, GathererStatus, StatusCell};
use crate::logging::{self, timed, timed_async};
use crate::pool::ProxyPool;
use crate::proxy::{HttpProbe, ValidatedProxy, ValidationProbe};
use crate::source::SourceRegistry;

/// Final line emitted by the status loop
pub const STATUS_LOOP_EXIT: &str =
    "All proxy gatherers are done, failed, or disabled. Exiting status updates.";

/// Gathers, validates and hands out proxies for one target
pub struct Rotator {
    config: RotatorConfig,
    pool: Arc<ProxyPool>,
    statuses: Vec<StatusCell>,
    pending: Mutex<Vec<Gatherer>>,
    tasks: Mutex<Vec<JoinHandle<GathererState>>>,
}

impl Rotator {
    /// Rotator over `registry`, validating candidates with [`HttpProbe`]
    pub fn new(config: RotatorConfig, registry: SourceRegistry) -> Result<Self> {
        Self::with_probe(config, registry, Arc::new(HttpProbe::new()))
    }

    /// Rotator over the built-in sites
    pub fn builtin(config: RotatorConfig) -> Result<Self> {
        let registry = SourceRegistry::builtin(&config)?;
        Self::new(config, registry)
    }

    /// Rotator with both sources and probe supplied by the caller
    pub fn with_probe(
        config: RotatorConfig,
        registry: SourceRegistry,
        probe: Arc<dyn ValidationProbe>,
    ) -> Result<Self> {
        config.validate()?;
        registry.validate()?;
        logging::init(config.log_level);

        let target = Arc::new(config.probe_target()?);
        let policy = GatherPolicy::from_config(&config);
        let pool = Arc::new(ProxyPool::new());

        let gatherers: Vec<Gatherer> = registry
            .into_fetchers()
            .into_iter()
            .map(|fetcher| {
                Gatherer::new(
                    fetcher,
                    Arc::clone(&probe),
                    Arc::clone(&pool),
                    Arc::clone(&target),
                    policy.clone(),
                )
            })
            .collect();
        let statuses = gatherers.iter().map(Gatherer::status).collect();

        info!(
            target_url = %config.target_url,
            sources = gatherers.len(),
            retry = config.get_proxy_retry,
            timeout_secs = config.get_proxy_timeout.as_secs_f64(),
            bootstrap_proxy = %config.proxy.as_ref().map(|p| p.url()).unwrap_or_default(),
            "rotator configured"
        );

        Ok(Self {
            config,
            pool,
            statuses,
            pending: Mutex::new(gatherers),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn every gatherer and return immediately
    ///
    /// Must be called from within a tokio runtime. Later calls do nothing.
    pub fn start(&self) {
        timed("start", || {
            let gatherers = std::mem::take(&mut *self.pending.lock());
            if gatherers.is_empty() {
                warn!("rotator already started");
                return;
            }
            info!(sources = gatherers.len(), "starting gatherers");
            let mut tasks = self.tasks.lock();
            tasks.extend(gatherers.into_iter().map(|g| tokio::spawn(g.run())));
        })
    }

    /// One validated proxy, chosen uniformly from the current pool
    pub fn pull_proxy(&self) -> Result<ValidatedProxy> {
        timed("pull_proxy", || self.pool.pull_random())
    }

    /// [`Self::pull_proxy`] rendered as `scheme://host:port`
    pub fn pull_proxy_url(&self) -> Result<String> {
        self.pull_proxy().map(|p| p.url())
    }

    /// Current status of every source, in registration order
    pub fn status_snapshot(&self) -> Vec<GathererStatus> {
        timed("status_snapshot", || {
            self.statuses.iter().map(StatusCell::get).collect()
        })
    }

    /// Stop a source early; returns false if it is unknown or already terminal
    pub fn disable(&self, source: &str) -> bool {
        timed("disable", || {
            let disabled = self
                .statuses
                .iter()
                .filter(|cell| cell.get().source == source)
                .any(|cell| cell.transition(GathererState::Disabled, None));
            if disabled {
                info!(source, "source disabled");
            }
            disabled
        })
    }

    /// Whether every source reached `done`, `failed` or `disabled`
    pub fn is_finished(&self) -> bool {
        self.statuses.iter().all(|cell| cell.state().is_terminal())
    }

    /// Wait until every source is terminal
    ///
    /// Never resolves for a rotator that was not started, unless all of its
    /// sources get disabled.
    pub async fn wait_until_finished(&self) -> Vec<GathererStatus> {
        timed_async(
            "wait_until_finished",
            join_all(self.statuses.iter().map(StatusCell::terminated)),
        )
        .await;
        self.status_snapshot()
    }

    /// Poll the status every `interval`, handing each rendering to `sink`,
    /// until every source is terminal
    pub async fn report_status(&self, interval: Duration, mut sink: impl FnMut(&str)) {
        timed_async("report_status", async {
            loop {
                let snapshot = self.status_snapshot();
                sink(&render_status(&snapshot));
                if snapshot.iter().all(GathererStatus::is_terminal) {
                    sink(STATUS_LOOP_EXIT);
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        })
        .await
    }

    /// [`Self::report_status`] printing to stdout
    pub async fn print_status(&self, interval: Duration) {
        self.report_status(interval, |text| println!("{}", text))
            .await
    }

    pub fn pool_snapshot(&self) -> Vec<ValidatedProxy> {
        self.pool.snapshot()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    pub fn config(&self) -> &RotatorConfig {
        &self.config
    }
}

impl Drop for Rotator {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
