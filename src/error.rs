//! Error types for the rotator

use thiserror::Error;

/// Unified error type for proxy gathering and rotation
#[derive(Error, Debug)]
pub enum RotatorError {
    /// A single source could not be reached or its page could not be parsed
    #[error("Source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// No validated proxy is currently available
    #[error("No validated proxies available")]
    PoolEmpty,

    /// Invalid configuration, detected at construction time
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A fetcher produced a candidate that can never be probed
    #[error("Invalid proxy candidate: {0}")]
    InvalidCandidate(String),
}

/// Result type alias for rotator operations
pub type Result<T> = std::result::Result<T, RotatorError>;

impl RotatorError {
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        RotatorError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is allowed to reach callers of the rotator
    pub fn crosses_boundary(&self) -> bool {
        matches!(self, RotatorError::PoolEmpty | RotatorError::Configuration(_))
    }
}

impl From<url::ParseError> for RotatorError {
    fn from(err: url::ParseError) -> Self {
        RotatorError::Configuration(format!("invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RotatorError::source_unavailable("hasdata.com", "HTTP status: 503");
        assert_eq!(
            err.to_string(),
            "Source hasdata.com unavailable: HTTP status: 503"
        );
        assert_eq!(
            RotatorError::PoolEmpty.to_string(),
            "No validated proxies available"
        );
    }

    #[test]
    fn test_boundary_errors() {
        assert!(RotatorError::PoolEmpty.crosses_boundary());
        assert!(RotatorError::Configuration("bad".to_string()).crosses_boundary());
        assert!(!RotatorError::source_unavailable("x", "down").crosses_boundary());
        assert!(!RotatorError::InvalidCandidate("x".to_string()).crosses_boundary());
    }

    #[test]
    fn test_url_parse_error_is_configuration() {
        let err: RotatorError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, RotatorError::Configuration(_)));
    }
}
