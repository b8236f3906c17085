//! Proxy data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RotatorError;

/// Proxy scheme enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Https,
    Socks5,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
            ProxyScheme::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyScheme {
    type Err = RotatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(ProxyScheme::Http),
            "https" => Ok(ProxyScheme::Https),
            "socks5" | "socks5h" => Ok(ProxyScheme::Socks5),
            other => Err(RotatorError::Configuration(format!(
                "unsupported proxy scheme: {}. Use: http, https, socks5",
                other
            ))),
        }
    }
}

/// Unvalidated proxy address produced by a source
///
/// Equality and hashing cover `(host, port, scheme)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyCandidate {
    pub host: String,
    pub port: u16,
    pub scheme: ProxyScheme,
}

impl ProxyCandidate {
    pub fn new(host: impl Into<String>, port: u16, scheme: ProxyScheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }

    /// Get the proxy URL string
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Get the proxy string in HOST:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject candidates that can never be dialed
    pub fn ensure_well_formed(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() || self.host.contains(char::is_whitespace) {
            return Err(RotatorError::InvalidCandidate(format!(
                "bad host in {:?}",
                self.to_simple_string()
            )));
        }
        if self.port == 0 {
            return Err(RotatorError::InvalidCandidate(format!(
                "port 0 in {}",
                self.url()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ProxyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// A candidate whose most recent probe succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedProxy {
    pub candidate: ProxyCandidate,
    pub last_checked_at: DateTime<Utc>,
}

impl ValidatedProxy {
    pub fn new(candidate: ProxyCandidate, last_checked_at: DateTime<Utc>) -> Self {
        Self {
            candidate,
            last_checked_at,
        }
    }

    /// Validated right now
    pub fn checked_now(candidate: ProxyCandidate) -> Self {
        Self::new(candidate, Utc::now())
    }

    pub fn url(&self) -> String {
        self.candidate.url()
    }
}

impl fmt::Display for ValidatedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.candidate)
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    Working,
    Failed(String),
    Timeout,
}

/// Detailed result of a probe, collapsed to a boolean by the gatherer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub candidate: ProxyCandidate,
    pub status: ProbeStatus,
    pub response_time: Option<Duration>,
}

impl ProbeResult {
    pub fn working(candidate: ProxyCandidate, response_time: Duration) -> Self {
        Self {
            candidate,
            status: ProbeStatus::Working,
            response_time: Some(response_time),
        }
    }

    pub fn failed(candidate: ProxyCandidate, error: impl ToString) -> Self {
        Self {
            candidate,
            status: ProbeStatus::Failed(error.to_string()),
            response_time: None,
        }
    }

    pub fn timeout(candidate: ProxyCandidate) -> Self {
        Self {
            candidate,
            status: ProbeStatus::Timeout,
            response_time: None,
        }
    }

    pub fn is_working(&self) -> bool {
        matches!(self.status, ProbeStatus::Working)
    }
}
