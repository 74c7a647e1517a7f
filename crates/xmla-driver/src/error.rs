//! Driver error types.

use thiserror::Error;
use xmla_cache::CacheError;
use xmla_client::TransportError;
use xmla_config::ConfigError;

/// Errors raised by [`RowCursor`](crate::RowCursor) accessors and moves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// No column carries this exact name.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A 1-based column index outside `1..=count`.
    #[error("column index {index} out of range (1..={count})")]
    ColumnIndexOutOfRange { index: usize, count: usize },

    /// The cursor is before the first or after the last row.
    #[error("cursor is not positioned on a row")]
    NoCurrentRow,

    /// A stored value cannot be read as the requested type.
    #[error("cannot read '{value}' in column '{column}' as {target}")]
    Parse {
        column: String,
        value: String,
        target: &'static str,
    },

    /// The cursor is read-only and scroll-only.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Cursor result type.
pub type CursorResult<T> = std::result::Result<T, CursorError>;

/// Connection-level error type.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Invalid connection properties.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The request could not be completed.
    #[error(transparent)]
    Client(xmla_client::Error),

    /// The cache store could not be created or rejected a lookup.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The response is not a readable rowset.
    #[error("cannot decode response: {0}")]
    Decode(String),

    /// The server answered with a SOAP fault.
    #[error("server fault {code}: {message}")]
    Fault { code: String, message: String },

    /// The connection was closed.
    #[error("connection is closed")]
    Closed,
}

impl From<xmla_client::Error> for DriverError {
    fn from(err: xmla_client::Error) -> Self {
        match err {
            xmla_client::Error::Transport(TransportError::Fault { code, message }) => {
                DriverError::Fault { code, message }
            }
            xmla_client::Error::Cache(e) => DriverError::Cache(e),
            xmla_client::Error::Cancelled => DriverError::Closed,
            other => DriverError::Client(other),
        }
    }
}

impl From<quick_xml::Error> for DriverError {
    fn from(err: quick_xml::Error) -> Self {
        DriverError::Decode(err.to_string())
    }
}

/// Driver result type.
pub type Result<T> = std::result::Result<T, DriverError>;
