//! Named connection profiles stored in a TOML file.
//!
//! ```toml
//! default_profile = "local"
//!
//! [profiles.local]
//! Server = "http://localhost:8080/xmla"
//! Catalog = "FoodMart"
//! Cache = "memory"
//! "Cache.Size" = "200"
//! ```
//!
//! Each profile is a flat property table with the same keys a connect
//! string carries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::connect::PropertyMap;
use crate::{ConfigError, Result};

/// Default config filename within the config directory.
const CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "xmla";

/// Environment variable overriding the config directory.
const CONFIG_DIR_ENV: &str = "XMLA_CONFIG_DIR";

/// Root of the profile file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilesConfig {
    /// Profile used when none is named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    /// Named property tables.
    #[serde(default)]
    pub profiles: BTreeMap<String, PropertyMap>,
}

impl ProfilesConfig {
    /// Create an empty profile set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get a profile by name.
    pub fn get(&self, name: &str) -> Option<&PropertyMap> {
        self.profiles.get(name)
    }

    /// Resolve a named profile, or the default one when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<&PropertyMap> {
        let name = match name {
            Some(name) => name,
            None => self
                .default_profile
                .as_deref()
                .ok_or(ConfigError::NoDefaultProfile)?,
        };
        self.get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))
    }

    /// Add or replace a profile.
    pub fn set_profile(&mut self, name: impl Into<String>, properties: PropertyMap) {
        self.profiles.insert(name.into(), properties);
    }

    /// Remove a profile, clearing the default if it pointed there.
    pub fn remove_profile(&mut self, name: &str) -> Option<PropertyMap> {
        let removed = self.profiles.remove(name);
        if removed.is_some() && self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        removed
    }

    /// List profile names in sorted order.
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

/// Load a profile file from an explicit path.
pub fn load_profiles_from(path: &Path) -> Result<ProfilesConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    ProfilesConfig::from_toml(&contents)
}

/// Load the user's profile file, or an empty set when there is none.
pub fn load_profiles() -> Result<ProfilesConfig> {
    match xdg_config_path() {
        Some(path) if path.is_file() => load_profiles_from(&path),
        _ => Ok(ProfilesConfig::new()),
    }
}

/// Save a profile file, creating parent directories.
pub fn save_profiles_to(config: &ProfilesConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Path of the user's profile file.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(CONFIG_FILE))
}

/// Config directory: `XMLA_CONFIG_DIR` if set, else the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}
