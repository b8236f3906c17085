//! Logging setup and operation timing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Instant;
use tracing::trace;
use tracing_subscriber::EnvFilter;

use crate::error::RotatorError;

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = RotatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(RotatorError::Configuration(format!(
                "invalid log level: {}. Use: trace, debug, info, warn, error",
                other
            ))),
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `level` when set. A subscriber installed earlier (by
/// the host application or a previous rotator) is left in place.
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ip_rotator={}", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Run `f`, logging entry, exit and elapsed time
pub fn timed<T>(operation: &'static str, f: impl FnOnce() -> T) -> T {
    trace!(operation, "enter");
    let start = Instant::now();
    let out = f();
    trace!(operation, elapsed_us = start.elapsed().as_micros() as u64, "exit");
    out
}

/// Async counterpart of [`timed`]
pub async fn timed_async<F: Future>(operation: &'static str, fut: F) -> F::Output {
    trace!(operation, "enter");
    let start = Instant::now();
    let out = fut.await;
    trace!(operation, elapsed_ms = start.elapsed().as_millis() as u64, "exit");
    out
}
