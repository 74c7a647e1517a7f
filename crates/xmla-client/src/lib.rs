//! SOAP transport for XMLA endpoints.
//!
//! [`CachedTransport`] sits between a connection and the wire. Each request
//! is first looked up in the connection's cache store; only misses are sent
//! through the [`SoapTransport`] (normally [`HttpTransport`]), and only
//! successful responses are written back.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use xmla_client::{soap, CachedTransport, HttpTransport};
//!
//! # async fn example() -> xmla_client::Result<()> {
//! let transport = CachedTransport::new(Arc::new(HttpTransport::builder().build()?));
//!
//! let url = url::Url::parse("http://localhost:8080/xmla")?;
//! let request = soap::execute_envelope("SELECT FROM [Sales]", &[("Catalog", "FoodMart")])?;
//! let response = transport.send(&url, soap::EXECUTE_ACTION, request).await?;
//! println!("{} bytes", response.len());
//! # Ok(())
//! # }
//! ```

pub mod cached;
pub mod error;
pub mod soap;
pub mod transport;

pub use cached::CachedTransport;
pub use error::{Error, Result, TransportError};
pub use soap::SoapFault;
pub use transport::{DEFAULT_TIMEOUT, HttpTransport, HttpTransportBuilder, SharedTransport, SoapTransport};
