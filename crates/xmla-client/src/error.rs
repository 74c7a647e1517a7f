//! Client error types.

use thiserror::Error;
use xmla_cache::CacheError;

/// A failed round-trip to the XMLA endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request exceeded its timeout.
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// The server could not be reached.
    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// The server answered with a SOAP fault.
    #[error("SOAP fault {code}: {message}")]
    Fault {
        /// `faultcode` of the fault.
        code: String,
        /// `faultstring` of the fault.
        message: String,
    },

    /// A success status with a body that is not a complete XMLA response.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Any other HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
}

impl TransportError {
    /// Classify a `reqwest` failure.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err)
        } else if err.is_connect() {
            TransportError::Connect(err)
        } else {
            TransportError::Http(err)
        }
    }

    /// Check if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout(_) | TransportError::Connect(_) => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Malformed(_) => true,
            TransportError::Fault { .. } | TransportError::Http(_) => false,
        }
    }
}

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The cache store rejected a lookup.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The round-trip failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request was abandoned because its connection was closed.
    #[error("request cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// URL parsing failed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Check if this error came from the cache store.
    pub fn is_cache_error(&self) -> bool {
        matches!(self, Error::Cache(_))
    }

    /// Check if this error came from the network round-trip.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(e) if e.is_retryable())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryability() {
        let server = TransportError::Status {
            status: 503,
            body: String::new(),
        };
        let client = TransportError::Status {
            status: 400,
            body: String::new(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(Error::from(server).is_retryable());
    }

    #[test]
    fn test_faults_are_not_retryable() {
        let err = Error::from(TransportError::Fault {
            code: "XMLAnalysisError".to_string(),
            message: "bad MDX".to_string(),
        });
        assert!(err.is_transport_error());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "SOAP fault XMLAnalysisError: bad MDX");
    }

    #[test]
    fn test_cache_errors() {
        let err = Error::from(CacheError::InvalidKey("empty".to_string()));
        assert!(err.is_cache_error());
        assert!(!err.is_retryable());
        assert!(Error::Cancelled.is_cancelled());
    }
}
