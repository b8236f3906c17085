//! Proxy module for parsing and validating candidates
//!
//! This module provides functionality for:
//! - Modelling candidates and validated proxies
//! - Parsing candidates from scraped text (HOST:PORT, scheme://HOST:PORT, HTML tables)
//! - Probing a candidate against the target with a bounded request

pub mod models;
pub mod parser;
pub mod probe;

pub use models::{ProbeResult, ProbeStatus, ProxyCandidate, ProxyScheme, ValidatedProxy};
pub use parser::ProxyParser;
pub use probe::{HttpProbe, ProbeTarget, ValidationProbe};
