//! Connection configuration for the XMLA driver.
//!
//! Provides:
//! - Connect-string parsing (`jdbc:xmla:Server=...;Catalog=...`)
//! - Routing of `Cache.<key>` properties to the cache store
//! - Typed connection settings (server, catalog, credentials, timeout)
//! - Named connection profiles in a TOML file

pub mod connect;
pub mod error;
pub mod profiles;
pub mod settings;

pub use connect::{
    CACHE_PREFIX, CONNECT_PREFIX, PropertyMap, SplitProperties, parse_connect_string,
    split_cache_properties, to_connect_string,
};
pub use error::{ConfigError, Result};
pub use profiles::{
    ProfilesConfig, load_profiles, load_profiles_from, save_profiles_to, xdg_config_dir,
    xdg_config_path,
};
pub use settings::{ConnectionSettings, keys};
