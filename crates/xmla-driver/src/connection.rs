//! A logical connection to an XMLA endpoint.

use std::sync::Arc;

use tracing::{debug, info};
use xmla_cache::{SessionId, SharedStore, create_store};
use xmla_client::{CachedTransport, HttpTransport, soap};
use xmla_config::{
    ConnectionSettings, PropertyMap, SplitProperties, parse_connect_string, split_cache_properties,
};

use crate::cursor::RowCursor;
use crate::error::{DriverError, Result};
use crate::rowset::decode_rowset;

/// Result format requested from the server.
const FORMAT: (&str, &str) = ("Format", "Tabular");

/// Content requested from the server: schema plus data.
const CONTENT: (&str, &str) = ("Content", "SchemaData");

/// An open connection.
///
/// The cache session is fixed when the connection opens and is used for
/// every request until the connection closes.
pub struct Connection {
    settings: ConnectionSettings,
    properties: SplitProperties,
    transport: CachedTransport,
}

impl Connection {
    /// Parse a connect string (`jdbc:xmla:Server=...;Catalog=...`) and open it.
    pub fn connect(connect_string: &str) -> Result<Self> {
        Self::open(&parse_connect_string(connect_string)?)
    }

    /// Open a connection, creating the cache store named by `Cache`.
    ///
    /// Without a `Cache` property requests go straight to the server.
    pub fn open(properties: &PropertyMap) -> Result<Self> {
        Self::build(properties, None)
    }

    /// Open a connection on a store shared with other connections.
    pub fn open_with_store(properties: &PropertyMap, store: SharedStore) -> Result<Self> {
        Self::build(properties, Some(store))
    }

    fn build(properties: &PropertyMap, store: Option<SharedStore>) -> Result<Self> {
        let split = split_cache_properties(properties);
        let settings = ConnectionSettings::from_properties(&split.connection)?;

        let mut http = HttpTransport::builder();
        if let Some(timeout) = settings.timeout {
            http = http.timeout(timeout);
        }
        if let Some(user) = &settings.user {
            http = http.basic_auth(user.clone(), settings.password.clone());
        }
        let mut transport = CachedTransport::new(Arc::new(http.build()?));

        let store = match (store, &settings.cache) {
            (Some(store), _) => Some(store),
            (None, Some(kind)) => Some(create_store(kind, &split.cache)?),
            (None, None) => None,
        };

        if let Some(store) = store {
            let session = store.configure(&split.connection, &split.cache);
            info!(
                server = %settings.server,
                store = store.name(),
                session = %session,
                "Opened connection with response cache"
            );
            transport = transport.with_cache(store, session);
        } else {
            info!(server = %settings.server, "Opened connection");
        }

        Ok(Self {
            settings,
            properties: split,
            transport,
        })
    }

    /// Resolved connection settings.
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Connection and cache properties as given at open time.
    pub fn properties(&self) -> &SplitProperties {
        &self.properties
    }

    /// Cache session id, or `None` when the connection has no cache.
    pub fn cache_session(&self) -> Option<&SessionId> {
        self.transport.session()
    }

    /// The cache store, if any.
    pub fn cache_store(&self) -> Option<&SharedStore> {
        self.transport.store()
    }

    /// Run an MDX statement and return its rowset.
    pub async fn execute(&self, mdx: &str) -> Result<RowCursor> {
        self.ensure_open()?;
        let properties = self.request_properties();
        let request = soap::execute_envelope(mdx, &as_pairs(&properties))?;

        debug!(statement = mdx, "Executing statement");
        let response = self
            .transport
            .send(&self.settings.server, soap::EXECUTE_ACTION, request)
            .await?;
        decode_rowset(&response)
    }

    /// Run a Discover request (`DISCOVER_DATASOURCES`, `MDSCHEMA_CUBES`, ...).
    pub async fn discover(
        &self,
        request_type: &str,
        restrictions: &[(&str, &str)],
    ) -> Result<RowCursor> {
        self.ensure_open()?;
        let properties = self.request_properties();
        let request = soap::discover_envelope(request_type, restrictions, &as_pairs(&properties))?;

        debug!(request_type, "Discovering metadata");
        let response = self
            .transport
            .send(&self.settings.server, soap::DISCOVER_ACTION, request)
            .await?;
        decode_rowset(&response)
    }

    /// Close the connection, abandoning requests still in flight.
    pub fn close(&self) {
        if !self.transport.is_cancelled() {
            self.transport.cancel();
            debug!(server = %self.settings.server, "Closed connection");
        }
    }

    /// Check if the connection is still open.
    pub fn is_valid(&self) -> bool {
        !self.transport.is_cancelled()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(DriverError::Closed)
        }
    }

    fn request_properties(&self) -> Vec<(&'static str, String)> {
        let mut properties = Vec::with_capacity(4);
        if let Some(data_source) = &self.settings.data_source {
            properties.push(("DataSourceInfo", data_source.clone()));
        }
        if let Some(catalog) = &self.settings.catalog {
            properties.push(("Catalog", catalog.clone()));
        }
        properties.push((FORMAT.0, FORMAT.1.to_string()));
        properties.push((CONTENT.0, CONTENT.1.to_string()));
        properties
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn as_pairs<'a>(properties: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    properties.iter().map(|(k, v)| (*k, v.as_str())).collect()
}
