use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ip_rotator::{
    config::default_headers, BootstrapProxy, LogLevel, ProxyParser, ProxyScheme, Rotator,
    RotatorConfig, RotatorError,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Gathers free proxies, validates them against a target and hands out working ones
#[derive(Parser)]
#[command(name = "ip-rotator")]
#[command(about = "Gathers free proxies, validates them against a target and hands out working ones")]
struct Cli {
    /// URL every proxy is validated against
    target_url: String,

    /// Proxy used to reach the proxy list sites (scheme://host:port)
    #[arg(short, long)]
    proxy: Option<String>,

    /// Extra request header as 'name: value' (can specify multiple)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Send only the --header values instead of layering them on the browser profile
    #[arg(long)]
    no_default_headers: bool,

    /// Consecutive fetch failures tolerated per source
    #[arg(short, long, default_value = "3")]
    retry: u32,

    /// Timeout in seconds for one fetch or one probe
    #[arg(short, long, default_value = "3")]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Seconds between status updates
    #[arg(short, long, default_value = "5")]
    interval: u64,

    /// Number of proxies to pull once gathering settles
    #[arg(short = 'n', long, default_value = "1")]
    count: usize,

    /// Print the final status and pulled proxies as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RotatorConfig::new(cli.target_url)
        .with_retry(cli.retry)
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_log_level(cli.log_level.parse::<LogLevel>()?)
        .with_headers(build_headers(&cli.headers, !cli.no_default_headers)?);

    if let Some(proxy) = &cli.proxy {
        config = config.with_proxy(parse_bootstrap_proxy(proxy)?);
    }

    let rotator = Rotator::builtin(config)?;
    rotator.start();

    if cli.json {
        rotator.wait_until_finished().await;
    } else {
        rotator
            .print_status(Duration::from_secs(cli.interval.max(1)))
            .await;
    }

    let mut proxies = Vec::with_capacity(cli.count);
    for _ in 0..cli.count {
        match rotator.pull_proxy_url() {
            Ok(url) => proxies.push(url),
            Err(RotatorError::PoolEmpty) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if cli.json {
        let report = serde_json::json!({
            "statuses": rotator.status_snapshot(),
            "pool_size": rotator.pool_size(),
            "proxies": proxies,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if proxies.is_empty() {
        eprintln!("No working proxy found for {}", rotator.config().target_url);
    } else {
        println!("\nWorking proxies ({} in pool):", rotator.pool_size());
        for proxy in &proxies {
            println!("  {}", proxy);
        }
    }

    Ok(())
}

fn parse_bootstrap_proxy(s: &str) -> Result<BootstrapProxy> {
    let candidate = ProxyParser::parse_line(s, ProxyScheme::Http)
        .ok_or_else(|| anyhow!("Invalid proxy: {}. Use: scheme://host:port", s))?;
    Ok(BootstrapProxy::try_from(candidate)?)
}

/// User headers, layered on the default profile when `with_defaults` is set
fn build_headers(raw: &[String], with_defaults: bool) -> Result<BTreeMap<String, String>> {
    let mut headers = if with_defaults {
        default_headers()
    } else {
        BTreeMap::new()
    };
    for entry in raw {
        let (name, value) = entry
            .split_once(':')
            .with_context(|| format!("Invalid header: {}. Use: 'name: value'", entry))?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_layer_on_defaults() {
        let headers = build_headers(&["user-agent: curl/8.0".to_string()], true).unwrap();
        assert_eq!(headers.len(), default_headers().len());
        assert_eq!(headers["user-agent"], "curl/8.0");
    }

    #[test]
    fn test_no_default_headers_replaces_profile() {
        let cli = Cli::try_parse_from([
            "ip-rotator",
            "https://example.com",
            "--no-default-headers",
            "-H",
            "x-token: abc",
        ])
        .unwrap();
        let headers = build_headers(&cli.headers, !cli.no_default_headers).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["x-token"], "abc");
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(build_headers(&["no-colon".to_string()], true).is_err());
    }

    #[test]
    fn test_bootstrap_proxy_flag() {
        let proxy = parse_bootstrap_proxy("socks5://127.0.0.1:1080").unwrap();
        assert_eq!(proxy.url(), "socks5://127.0.0.1:1080");
        assert!(parse_bootstrap_proxy("not a proxy").is_err());
    }
}
