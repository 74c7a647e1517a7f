//! Per-partition cache settings read from `Cache.` properties.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{CacheError, Result};
use crate::PropertyMap;

/// Default maximum number of responses held by one partition.
pub const DEFAULT_SIZE: usize = 50;

/// Default time a response stays valid after it was stored.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Cache property names (already stripped of the `Cache.` prefix).
pub mod props {
    /// Shared partition name.
    pub const NAME: &str = "Name";
    /// Maximum entries per partition.
    pub const SIZE: &str = "Size";
    /// Entry lifetime in seconds; `0` disables expiry.
    pub const TIMEOUT: &str = "Timeout";
    /// Eviction mode.
    pub const MODE: &str = "Mode";
    /// Root directory of the replay store.
    pub const DIRECTORY: &str = "Directory";
}

/// Which entry leaves a full partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionMode {
    /// Least recently read or written.
    #[default]
    Lru,
    /// Fewest hits.
    Lfu,
    /// Most hits.
    Mfu,
    /// Oldest insert.
    Fifo,
    /// Newest insert.
    Lifo,
}

impl FromStr for EvictionMode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRU" => Ok(EvictionMode::Lru),
            "LFU" => Ok(EvictionMode::Lfu),
            "MFU" => Ok(EvictionMode::Mfu),
            "FIFO" => Ok(EvictionMode::Fifo),
            "LIFO" => Ok(EvictionMode::Lifo),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EvictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionMode::Lru => "LRU",
            EvictionMode::Lfu => "LFU",
            EvictionMode::Mfu => "MFU",
            EvictionMode::Fifo => "FIFO",
            EvictionMode::Lifo => "LIFO",
        };
        f.write_str(name)
    }
}

/// Settings for one cache partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSettings {
    /// Maximum number of entries before eviction.
    pub size: usize,

    /// Entry lifetime, measured from when it was stored. `None` never expires.
    pub timeout: Option<Duration>,

    /// Eviction policy.
    pub mode: EvictionMode,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            timeout: Some(DEFAULT_TIMEOUT),
            mode: EvictionMode::default(),
        }
    }
}

impl PartitionSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries (clamped to at least one).
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size.max(1);
        self
    }

    /// Set the entry lifetime.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Entries never expire.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the eviction mode.
    pub fn with_mode(mut self, mode: EvictionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Read settings strictly: any unusable value is an error.
    pub fn from_properties(props: &PropertyMap) -> Result<Self> {
        Self::default().overlay(props)
    }

    /// Overlay properties onto these settings, failing on unusable values.
    pub fn overlay(&self, props: &PropertyMap) -> Result<Self> {
        let mut settings = self.clone();

        if let Some(raw) = props.get(props::SIZE) {
            settings.size = match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => return Err(invalid(props::SIZE, raw)),
            };
        }

        if let Some(raw) = props.get(props::TIMEOUT) {
            settings.timeout = match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => return Err(invalid(props::TIMEOUT, raw)),
            };
        }

        if let Some(raw) = props.get(props::MODE) {
            settings.mode = raw.parse().map_err(|_| invalid(props::MODE, raw))?;
        }

        Ok(settings)
    }

    /// Overlay properties, keeping the current value (and logging) for any
    /// key whose value is unusable.
    pub fn overlay_lossy(&self, props: &PropertyMap) -> Self {
        let mut settings = self.clone();
        for key in [props::SIZE, props::TIMEOUT, props::MODE] {
            let Some(value) = props.get(key) else {
                continue;
            };
            let mut single = PropertyMap::new();
            single.insert(key.to_string(), value.clone());
            match settings.overlay(&single) {
                Ok(updated) => settings = updated,
                Err(e) => warn!(error = %e, "Ignoring cache property"),
            }
        }
        settings
    }
}

fn invalid(key: &str, value: &str) -> CacheError {
    CacheError::InvalidProperty {
        key: key.to_string(),
        value: value.to_string(),
    }
}
