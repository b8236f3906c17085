//! Proxy parser module for turning scraped text into candidates

use crate::proxy::models::{ProxyCandidate, ProxyScheme};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// `scheme://host:port`, optionally with a trailing slash
static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(https?|socks5h?)://([^:/\s]+):(\d{1,5})/?$").expect("Invalid URL regex")
});

/// Regex pattern to match IP:PORT patterns in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b")
        .expect("Invalid IP:PORT regex")
});

/// Dotted hostname with an alphabetic top-level label
static HOSTNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$")
        .expect("Invalid hostname regex")
});

/// Table rows where the address and the port sit in adjacent cells
static TABLE_ROW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<td[^>]*>\s*(?:<[^>]+>\s*)*(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\s*(?:</[^>]+>\s*)*</td>\s*<td[^>]*>\s*(?:<[^>]+>\s*)*(\d{1,5})\s*(?:</[^>]+>\s*)*</td>",
    )
    .expect("Invalid table row regex")
});

/// Proxy parser for parsing candidates from strings
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line
    ///
    /// Supports formats:
    /// - HOST:PORT
    /// - scheme://HOST:PORT
    pub fn parse_line(line: &str, default_scheme: ProxyScheme) -> Option<ProxyCandidate> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        if let Some(candidate) = Self::parse_url_format(line) {
            return Some(candidate);
        }

        Self::parse_colon_format(line, default_scheme)
    }

    fn parse_url_format(line: &str) -> Option<ProxyCandidate> {
        let caps = URL_REGEX.captures(line)?;
        let scheme: ProxyScheme = caps[1].parse().ok()?;
        let port: u16 = caps[3].parse().ok()?;
        Self::accept(caps[2].to_string(), port, scheme)
    }

    fn parse_colon_format(line: &str, default_scheme: ProxyScheme) -> Option<ProxyCandidate> {
        let (host, port) = line.split_once(':')?;
        if host.parse::<Ipv4Addr>().is_err() && !HOSTNAME_REGEX.is_match(host) {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        Self::accept(host.to_string(), port, default_scheme)
    }

    fn accept(host: String, port: u16, scheme: ProxyScheme) -> Option<ProxyCandidate> {
        if port == 0 {
            return None;
        }
        Some(ProxyCandidate::new(host, port, scheme))
    }

    /// Parse candidates from a scraped page
    ///
    /// Results of every strategy are merged in this order:
    /// 1. Line-by-line parsing
    /// 2. HTML table rows with address and port in adjacent cells
    /// 3. Regex-based IP:PORT extraction
    ///
    /// An address found by an earlier strategy keeps that strategy's scheme.
    pub fn parse_text(content: &str, default_scheme: ProxyScheme) -> Vec<ProxyCandidate> {
        let lines = content
            .lines()
            .filter_map(|line| Self::parse_line(line, default_scheme));
        let table = Self::extract_table_rows(content, default_scheme);
        let loose = Self::extract_with_regex(content, default_scheme);

        let mut seen = HashSet::new();
        lines
            .chain(table)
            .chain(loose)
            .filter(|c| seen.insert((c.host.clone(), c.port)))
            .collect()
    }

    fn extract_table_rows(content: &str, scheme: ProxyScheme) -> Vec<ProxyCandidate> {
        TABLE_ROW_REGEX
            .captures_iter(content)
            .filter_map(|cap| {
                let host = cap.get(1)?.as_str();
                let port: u16 = cap.get(2)?.as_str().parse().ok()?;
                Self::accept_ipv4(host, port, scheme)
            })
            .collect()
    }

    fn extract_with_regex(content: &str, scheme: ProxyScheme) -> Vec<ProxyCandidate> {
        IP_PORT_REGEX
            .captures_iter(content)
            .filter_map(|cap| {
                let host = cap.get(1)?.as_str();
                let port: u16 = cap.get(2)?.as_str().parse().ok()?;
                Self::accept_ipv4(host, port, scheme)
            })
            .collect()
    }

    fn accept_ipv4(host: &str, port: u16, scheme: ProxyScheme) -> Option<ProxyCandidate> {
        host.parse::<Ipv4Addr>().ok()?;
        Self::accept(host.to_string(), port, scheme)
    }
}
