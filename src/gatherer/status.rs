//! Per-source gatherer status
//!
//! # State Transitions
//! ```text
//! not_started → started → fetching → done | failed
//! any non-terminal → disabled
//! ```
//!
//! Each source's status lives in a watch channel. Every write goes through
//! [`StatusCell::transition`], which refuses moves the machine does not
//! allow, so observers can never see a terminal state regress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle state of one gatherer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GathererState {
    #[default]
    NotStarted,
    Started,
    Fetching,
    Done,
    Failed,
    Disabled,
}

impl GathererState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GathererState::NotStarted => "not_started",
            GathererState::Started => "started",
            GathererState::Fetching => "fetching",
            GathererState::Done => "done",
            GathererState::Failed => "failed",
            GathererState::Disabled => "disabled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GathererState::Done | GathererState::Failed | GathererState::Disabled
        )
    }

    pub fn can_transition_to(&self, next: GathererState) -> bool {
        use GathererState::*;
        matches!(
            (self, next),
            (NotStarted, Started)
                | (Started, Fetching)
                | (Fetching, Fetching)
                | (Fetching, Done)
                | (Started, Failed)
                | (Fetching, Failed)
                | (NotStarted, Disabled)
                | (Started, Disabled)
                | (Fetching, Disabled)
        )
    }

    /// ANSI color used when rendering the state
    fn color(&self) -> &'static str {
        match self {
            GathererState::Disabled => "\x1b[30m",
            GathererState::NotStarted => "\x1b[97m",
            GathererState::Started => "\x1b[34m",
            GathererState::Fetching => "\x1b[33m",
            GathererState::Done => "\x1b[92m",
            GathererState::Failed => "\x1b[91m",
        }
    }
}

impl fmt::Display for GathererState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status record for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GathererStatus {
    pub source: String,
    pub state: GathererState,
    pub page_cursor: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl GathererStatus {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: GathererState::NotStarted,
            page_cursor: None,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a transition in place; returns false and leaves the record
    /// untouched if the move is not allowed
    pub fn advance(&mut self, next: GathererState, page: Option<u32>) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        let now = Utc::now();
        if next == GathererState::Started {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.ended_at = Some(now);
        }
        if page.is_some() {
            self.page_cursor = page;
        }
        self.state = next;
        true
    }

    /// One line of the status table
    pub fn render(&self) -> String {
        let page = self
            .page_cursor
            .map_or_else(|| "None".to_string(), |p| p.to_string());
        let time = |t: Option<DateTime<Utc>>| {
            t.map_or_else(|| "None".to_string(), |t| t.format("%H:%M:%S").to_string())
        };
        format!(
            "Source: {}, Status:{} {} \x1b[0m, Page: {}, Start Time: {}, End Time: {}",
            self.source,
            self.state.color(),
            self.state,
            page,
            time(self.started_at),
            time(self.ended_at)
        )
    }
}

/// Render a snapshot as the human-readable status table
pub fn render_status(statuses: &[GathererStatus]) -> String {
    let mut out = String::from("\nCurrent Status:\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\nProxy Gatherers:");
    for status in statuses {
        out.push('\n');
        out.push_str(&status.render());
    }
    out
}

/// Shared, monotonic status of one source
#[derive(Debug, Clone)]
pub struct StatusCell {
    tx: Arc<watch::Sender<GathererStatus>>,
}

impl StatusCell {
    pub fn new(source: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(GathererStatus::new(source));
        Self { tx: Arc::new(tx) }
    }

    /// Move to `next`, recording `page` as the cursor when given
    pub fn transition(&self, next: GathererState, page: Option<u32>) -> bool {
        self.tx.send_if_modified(|status| status.advance(next, page))
    }

    pub fn get(&self) -> GathererStatus {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> GathererState {
        self.tx.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<GathererStatus> {
        self.tx.subscribe()
    }

    /// Resolve once the source reaches a terminal state
    pub async fn terminated(&self) -> GathererState {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(status) => status.state,
            // The sender lives as long as `self`, so this is unreachable in practice.
            Err(_) => self.state(),
        };
        state
    }
}
