//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while parsing connect strings and loading profiles.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a profile file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write a profile file.
    #[error("failed to write config file '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Connect string is malformed.
    #[error("invalid connect string at position {position}: {reason}")]
    InvalidConnectString { position: usize, reason: String },

    /// A required connection property is absent.
    #[error("missing required property '{0}'")]
    MissingProperty(String),

    /// A connection property has a value that cannot be used.
    #[error("invalid value '{value}' for property '{key}': {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },

    /// Named profile not found.
    #[error("profile '{0}' not found")]
    ProfileNotFound(String),

    /// No profile requested and no default configured.
    #[error("no default profile configured; pass a profile name or set default_profile")]
    NoDefaultProfile,
}
