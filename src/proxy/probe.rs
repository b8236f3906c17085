//! Validation probe: one bounded request to the target through a candidate

use crate::proxy::models::{ProbeResult, ProxyCandidate};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{redirect, Client, Proxy as ReqwestProxy};
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use url::Url;

/// What a probe requests and how long it may take
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub url: Url,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

impl ProbeTarget {
    pub fn new(url: Url, headers: HeaderMap, timeout: Duration) -> Self {
        Self {
            url,
            headers,
            timeout,
        }
    }
}

/// Decides whether a candidate can reach the target
///
/// Ordinary network failures are `Ok(false)`. Only a malformed candidate is an
/// error.
#[async_trait]
pub trait ValidationProbe: Send + Sync {
    async fn probe(&self, candidate: &ProxyCandidate, target: &ProbeTarget) -> Result<bool>;
}

/// Probe backed by a reqwest client routed through the candidate
#[derive(Debug, Clone, Default)]
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }

    /// Check a single candidate and report latency or the failure reason
    pub async fn check(
        &self,
        candidate: &ProxyCandidate,
        target: &ProbeTarget,
    ) -> Result<ProbeResult> {
        candidate.ensure_well_formed()?;
        let start = Instant::now();

        let client = match Self::create_client(candidate, target) {
            Ok(client) => client,
            Err(e) => return Ok(ProbeResult::failed(candidate.clone(), e)),
        };

        let result = match tokio::time::timeout(
            target.timeout,
            client.get(target.url.clone()).send(),
        )
        .await
        {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    ProbeResult::working(candidate.clone(), start.elapsed())
                } else {
                    ProbeResult::failed(candidate.clone(), format!("HTTP status: {}", status))
                }
            }
            Ok(Err(e)) if e.is_timeout() => ProbeResult::timeout(candidate.clone()),
            Ok(Err(e)) => ProbeResult::failed(candidate.clone(), e),
            Err(_) => ProbeResult::timeout(candidate.clone()),
        };

        trace!(proxy = %candidate, status = ?result.status, "probe finished");
        Ok(result)
    }

    /// Create a reqwest client that sends every request through the candidate
    fn create_client(
        candidate: &ProxyCandidate,
        target: &ProbeTarget,
    ) -> std::result::Result<Client, reqwest::Error> {
        let proxy = ReqwestProxy::all(candidate.url())?;

        Client::builder()
            .proxy(proxy)
            .default_headers(target.headers.clone())
            .redirect(redirect::Policy::none())
            .timeout(target.timeout)
            .build()
    }
}

#[async_trait]
impl ValidationProbe for HttpProbe {
    async fn probe(&self, candidate: &ProxyCandidate, target: &ProbeTarget) -> Result<bool> {
        let result = self.check(candidate, target).await?;
        if !result.is_working() {
            debug!(proxy = %candidate, status = ?result.status, "candidate rejected");
        }
        Ok(result.is_working())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RotatorError;
    use crate::proxy::models::{ProbeStatus, ProxyScheme};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn target(url: &str, timeout: Duration) -> ProbeTarget {
        ProbeTarget::new(Url::parse(url).unwrap(), HeaderMap::new(), timeout)
    }

    /// Minimal forward proxy answering every request with a fixed status line
    async fn spawn_fake_proxy(status_line: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "{}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                        status_line
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        port
    }

    #[tokio::test]
    async fn test_probe_rejects_malformed_candidate() {
        let probe = HttpProbe::new();
        let candidate = ProxyCandidate::new("", 8080, ProxyScheme::Http);
        let result = probe
            .probe(&candidate, &target("http://example.com", Duration::from_secs(1)))
            .await;
        assert!(matches!(result, Err(RotatorError::InvalidCandidate(_))));
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_false() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = HttpProbe::new();
        let candidate = ProxyCandidate::new("127.0.0.1", port, ProxyScheme::Http);
        let ok = probe
            .probe(&candidate, &target("http://example.com", Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_probe_accepts_success_and_redirect() {
        let probe = HttpProbe::new();
        for status_line in ["HTTP/1.1 200 OK", "HTTP/1.1 302 Found"] {
            let port = spawn_fake_proxy(status_line).await;
            let candidate = ProxyCandidate::new("127.0.0.1", port, ProxyScheme::Http);
            let ok = probe
                .probe(&candidate, &target("http://example.com/", Duration::from_secs(2)))
                .await
                .unwrap();
            assert!(ok, "{} should validate", status_line);
        }
    }

    #[tokio::test]
    async fn test_probe_rejects_error_status() {
        let port = spawn_fake_proxy("HTTP/1.1 502 Bad Gateway").await;
        let probe = HttpProbe::new();
        let candidate = ProxyCandidate::new("127.0.0.1", port, ProxyScheme::Http);
        let result = probe
            .check(&candidate, &target("http://example.com/", Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(matches!(result.status, ProbeStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_probe_times_out() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let probe = HttpProbe::new();
        let candidate = ProxyCandidate::new("127.0.0.1", port, ProxyScheme::Http);
        let result = probe
            .check(
                &candidate,
                &target("http://example.com/", Duration::from_millis(200)),
            )
            .await
            .unwrap();
        assert!(!result.is_working());
    }
}
