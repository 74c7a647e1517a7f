//! Raw SOAP-over-HTTP transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result, TransportError};
use crate::soap::{check_fault, check_well_formed};

/// Default timeout for requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of an error body kept in [`TransportError::Status`].
const STATUS_BODY_LIMIT: usize = 512;

/// Sends one SOAP request and returns the successful response body.
///
/// Implementations report non-success statuses, SOAP faults and malformed
/// bodies as [`TransportError`]s, so any `Ok` body is safe to cache.
#[async_trait]
pub trait SoapTransport: Send + Sync {
    /// POST `body` to `url` with the given `SOAPAction`.
    async fn post(&self, url: &Url, action: &str, body: Bytes) -> Result<Bytes>;
}

/// A transport shared between connections.
pub type SharedTransport = Arc<dyn SoapTransport>;

/// `reqwest`-backed [`SoapTransport`].
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    http: reqwest::Client,
    timeout: Duration,
    credentials: Option<(String, Option<String>)>,
}

impl HttpTransport {
    /// Create a new transport builder.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }
}

#[async_trait]
impl SoapTransport for HttpTransport {
    async fn post(&self, url: &Url, action: &str, body: Bytes) -> Result<Bytes> {
        trace!(url = %url, action, bytes = body.len(), "Sending SOAP request");

        let mut request = self
            .inner
            .http
            .post(url.clone())
            .header("SOAPAction", format!("\"{}\"", action))
            .timeout(self.inner.timeout)
            .body(body);
        if let Some((user, password)) = &self.inner.credentials {
            request = request.basic_auth(user, password.as_deref());
        }

        let response = request.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(TransportError::from_reqwest)?;

        // SOAP 1.1 servers report faults with HTTP 500, so look for one first.
        if let Some(fault) = check_fault(&bytes) {
            debug!(url = %url, code = %fault.code, "Server returned a SOAP fault");
            return Err(TransportError::Fault {
                code: fault.code,
                message: fault.message,
            }
            .into());
        }

        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "Server returned an error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes)
                    .chars()
                    .take(STATUS_BODY_LIMIT)
                    .collect(),
            }
            .into());
        }

        if let Err(reason) = check_well_formed(&bytes) {
            debug!(url = %url, reason = %reason, "Server returned a malformed response");
            return Err(TransportError::Malformed(reason).into());
        }

        trace!(url = %url, bytes = bytes.len(), "Received SOAP response");
        Ok(bytes)
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    credentials: Option<(String, Option<String>)>,
}

impl HttpTransportBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            credentials: None,
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Send HTTP basic credentials with every request.
    pub fn basic_auth(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some((user.into(), password));
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<HttpTransport> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=utf-8"),
        );

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("xmla-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport {
            inner: Arc::new(TransportInner {
                http,
                timeout: self.timeout,
                credentials: self.credentials,
            }),
        })
    }
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
