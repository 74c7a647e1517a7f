//! Typed view over the connection half of a property map.

use std::time::Duration;

use url::Url;

use crate::connect::PropertyMap;
use crate::{ConfigError, Result};

/// Well-known connection property names.
pub mod keys {
    /// Endpoint URL of the XMLA service. Required.
    pub const SERVER: &str = "Server";
    /// Catalog sent with every request.
    pub const CATALOG: &str = "Catalog";
    /// `DataSourceInfo` sent with every request.
    pub const DATA_SOURCE: &str = "DataSource";
    /// HTTP basic user name.
    pub const USER: &str = "User";
    /// HTTP basic password.
    pub const PASSWORD: &str = "Password";
    /// Request timeout in seconds; must be positive.
    pub const TIMEOUT: &str = "Timeout";
    /// Cache store kind (`memory`, `replay`). Absent means no cache.
    pub const CACHE: &str = "Cache";
}

/// Connection settings resolved from a property map.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// XMLA endpoint.
    pub server: Url,
    /// Catalog to query.
    pub catalog: Option<String>,
    /// Data source name.
    pub data_source: Option<String>,
    /// User for HTTP basic authentication.
    pub user: Option<String>,
    /// Password for HTTP basic authentication.
    pub password: Option<String>,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
    /// Selected cache store kind.
    pub cache: Option<String>,
}

impl ConnectionSettings {
    /// Resolve settings from connection properties.
    ///
    /// Unknown keys are ignored; they still travel to the cache store as part
    /// of the connection config.
    pub fn from_properties(properties: &PropertyMap) -> Result<Self> {
        let raw_server = non_empty(properties, keys::SERVER)
            .ok_or_else(|| ConfigError::MissingProperty(keys::SERVER.to_string()))?;

        let server = Url::parse(raw_server).map_err(|e| ConfigError::InvalidProperty {
            key: keys::SERVER.to_string(),
            value: raw_server.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidProperty {
                key: keys::SERVER.to_string(),
                value: raw_server.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        let timeout = match non_empty(properties, keys::TIMEOUT) {
            // Zero is rejected: a zero request timeout fails every call.
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(ConfigError::InvalidProperty {
                        key: keys::TIMEOUT.to_string(),
                        value: raw.to_string(),
                        reason: "expected a positive whole number of seconds".to_string(),
                    });
                }
            },
            None => None,
        };

        Ok(Self {
            server,
            catalog: non_empty(properties, keys::CATALOG).map(str::to_string),
            data_source: non_empty(properties, keys::DATA_SOURCE).map(str::to_string),
            user: non_empty(properties, keys::USER).map(str::to_string),
            password: properties.get(keys::PASSWORD).cloned(),
            timeout,
            cache: non_empty(properties, keys::CACHE).map(str::to_string),
        })
    }
}

fn non_empty<'a>(properties: &'a PropertyMap, key: &str) -> Option<&'a str> {
    properties
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::parse_connect_string;

    #[test]
    fn test_full_settings() {
        let props = parse_connect_string(
            "Server=https://olap.example.com/xmla;Catalog=FoodMart;DataSource=Provider=Mondrian;User=a;Password=p;Timeout=5;Cache=memory",
        )
        .unwrap();

        let settings = ConnectionSettings::from_properties(&props).unwrap();
        assert_eq!(settings.server.as_str(), "https://olap.example.com/xmla");
        assert_eq!(settings.catalog.as_deref(), Some("FoodMart"));
        assert_eq!(settings.data_source.as_deref(), Some("Provider=Mondrian"));
        assert_eq!(settings.user.as_deref(), Some("a"));
        assert_eq!(settings.password.as_deref(), Some("p"));
        assert_eq!(settings.timeout, Some(Duration::from_secs(5)));
        assert_eq!(settings.cache.as_deref(), Some("memory"));
    }

    #[test]
    fn test_server_is_required() {
        let props = parse_connect_string("Catalog=FoodMart").unwrap();
        let err = ConnectionSettings::from_properties(&props).unwrap_err();
        assert!(matches!(err, ConfigError::MissingProperty(ref k) if k == "Server"));
    }

    #[test]
    fn test_server_must_be_http() {
        let props = parse_connect_string("Server=ftp://h/x").unwrap();
        let err = ConnectionSettings::from_properties(&props).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProperty { .. }));
    }

    #[test]
    fn test_bad_timeout() {
        let props = parse_connect_string("Server=http://h;Timeout=soon").unwrap();
        let err = ConnectionSettings::from_properties(&props).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProperty { ref key, .. } if key == "Timeout"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let props = parse_connect_string("Server=http://h;Timeout=0").unwrap();
        let err = ConnectionSettings::from_properties(&props).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidProperty { ref key, ref value, .. } if key == "Timeout" && value == "0")
        );
    }

    #[test]
    fn test_blank_cache_means_none() {
        let props = parse_connect_string("Server=http://h;Cache=").unwrap();
        let settings = ConnectionSettings::from_properties(&props).unwrap();
        assert!(settings.cache.is_none());
        assert!(settings.timeout.is_none());
    }
}
