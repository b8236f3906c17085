//! Per-source gathering state machine
//!
//! # Responsibilities
//! - Page through one source until it runs dry or a budget runs out
//! - Validate every candidate of a page before asking for the next one
//! - Feed the shared pool and evict candidates that fail a re-probe
//! - Publish its own status
//!
//! Nothing that goes wrong inside a gatherer leaves it: fetch errors end up
//! in the status, probe failures are dropped.

pub mod status;

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::RotatorConfig;
use crate::error::RotatorError;
use crate::pool::ProxyPool;
use crate::proxy::{ProbeTarget, ProxyCandidate, ValidatedProxy, ValidationProbe};
use crate::source::SourceFetcher;

pub use status::{render_status, GathererState, GathererStatus, StatusCell};

/// Budgets applied to every source
#[derive(Debug, Clone)]
pub struct GatherPolicy {
    /// Consecutive fetch failures before the source fails
    pub retry: u32,
    /// Limit for one fetch call
    pub fetch_timeout: Duration,
    /// Simultaneous probes within one page
    pub probe_concurrency: usize,
    pub retry_delay: Duration,
    /// Wall-clock budget for the whole source
    pub source_deadline: Duration,
    pub max_pages: u32,
}

impl GatherPolicy {
    pub fn from_config(config: &RotatorConfig) -> Self {
        Self {
            retry: config.get_proxy_retry,
            fetch_timeout: config.get_proxy_timeout,
            probe_concurrency: config.probe_concurrency,
            retry_delay: config.retry_delay,
            source_deadline: config.source_deadline,
            max_pages: config.max_pages,
        }
    }
}

/// Drives one source from `not_started` to a terminal state
pub struct Gatherer {
    fetcher: Arc<dyn SourceFetcher>,
    probe: Arc<dyn ValidationProbe>,
    pool: Arc<ProxyPool>,
    target: Arc<ProbeTarget>,
    policy: GatherPolicy,
    status: StatusCell,
}

impl Gatherer {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        probe: Arc<dyn ValidationProbe>,
        pool: Arc<ProxyPool>,
        target: Arc<ProbeTarget>,
        policy: GatherPolicy,
    ) -> Self {
        let status = StatusCell::new(fetcher.name());
        Self {
            fetcher,
            probe,
            pool,
            target,
            policy,
            status,
        }
    }

    pub fn name(&self) -> &str {
        self.fetcher.name()
    }

    /// Handle to this gatherer's status, valid after the gatherer is consumed
    pub fn status(&self) -> StatusCell {
        self.status.clone()
    }

    /// Run to completion and return the terminal state
    ///
    /// Stops at the next suspension point if the status is switched to
    /// `disabled` from outside.
    pub async fn run(self) -> GathererState {
        let cell = self.status.clone();
        tokio::select! {
            _ = self.gather() => {},
            _ = cell.terminated() => {},
        }
        let state = cell.state();
        if state == GathererState::Disabled {
            info!(source = %self.name(), "gatherer disabled");
        }
        state
    }

    async fn gather(&self) {
        let source = self.name();
        if !self.status.transition(GathererState::Started, None) {
            return;
        }
        info!(source, "gatherer started");

        let deadline = Instant::now() + self.policy.source_deadline;
        let mut page = 1u32;
        let mut consecutive_failures = 0u32;
        let mut pages_fetched = 0u32;
        let mut accepted_total = 0usize;

        loop {
            let now = Instant::now();
            if now >= deadline {
                let outcome = if pages_fetched > 0 {
                    GathererState::Done
                } else {
                    GathererState::Failed
                };
                warn!(source, page, "source deadline elapsed");
                self.finish(outcome, accepted_total);
                return;
            }

            if !self.status.transition(GathererState::Fetching, Some(page)) {
                return;
            }

            let budget = self.policy.fetch_timeout.min(deadline - now);
            let fetched = match timeout(budget, self.fetcher.fetch(page)).await {
                Ok(result) => result,
                Err(_) => Err(RotatorError::source_unavailable(
                    source,
                    format!("page {} timed out after {:?}", page, budget),
                )),
            };

            match fetched {
                Ok(result) => {
                    consecutive_failures = 0;
                    pages_fetched += 1;
                    debug!(
                        source,
                        page,
                        candidates = result.candidates.len(),
                        has_more = result.has_more,
                        "page fetched"
                    );

                    accepted_total += self.validate_page(result.candidates).await;

                    if !result.has_more || page >= self.policy.max_pages {
                        self.finish(GathererState::Done, accepted_total);
                        return;
                    }
                    page += 1;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        source,
                        page,
                        attempt = consecutive_failures,
                        error = %e,
                        "fetch failed"
                    );
                    if consecutive_failures >= self.policy.retry {
                        self.finish(GathererState::Failed, accepted_total);
                        return;
                    }
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    sleep(self.policy.retry_delay.min(remaining)).await;
                }
            }
        }
    }

    /// Probe every candidate of one page; returns how many were accepted
    async fn validate_page(&self, candidates: Vec<ProxyCandidate>) -> usize {
        stream::iter(candidates)
            .map(|candidate| self.validate(candidate))
            .buffer_unordered(self.policy.probe_concurrency)
            .collect::<Vec<bool>>()
            .await
            .into_iter()
            .filter(|accepted| *accepted)
            .count()
    }

    /// Probe one candidate and apply the outcome to the pool
    async fn validate(&self, candidate: ProxyCandidate) -> bool {
        let accepted = match timeout(
            self.target.timeout,
            self.probe.probe(&candidate, &self.target),
        )
        .await
        {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                error!(source = %self.name(), proxy = %candidate, error = %e, "dropping malformed candidate");
                return false;
            }
            Err(_) => false,
        };

        if accepted {
            if self.pool.upsert(ValidatedProxy::checked_now(candidate.clone())) {
                debug!(source = %self.name(), proxy = %candidate, "proxy accepted");
            }
        } else if self.pool.evict(&candidate) {
            debug!(source = %self.name(), proxy = %candidate, "proxy evicted after failed re-probe");
        }
        accepted
    }

    fn finish(&self, state: GathererState, accepted: usize) {
        if self.status.transition(state, None) {
            info!(source = %self.name(), state = %state, accepted, "gatherer finished");
        }
    }
}
