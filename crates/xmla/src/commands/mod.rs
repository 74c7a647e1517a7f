//! CLI command handlers.

pub mod discover;
pub mod parse_connect;
pub mod profiles;
pub mod query;

use anyhow::{Context as _, Result, bail};
use xmla_config::{PropertyMap, load_profiles, parse_connect_string};
use xmla_driver::Connection;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Connect string given on the command line or in `XMLA_CONNECT`.
    pub connect: Option<String>,
    /// Profile name given on the command line or in `XMLA_PROFILE`.
    pub profile: Option<String>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Connection properties from the connect string, else from a profile.
    ///
    /// With neither given, the profile file's default profile is used.
    pub fn properties(&self) -> Result<PropertyMap> {
        if let Some(connect) = &self.connect {
            if self.profile.is_some() {
                bail!("--connect and --profile cannot be used together");
            }
            return parse_connect_string(connect).context("invalid connect string");
        }

        let profiles = load_profiles().context("failed to load profiles")?;
        let properties = profiles
            .resolve(self.profile.as_deref())
            .context("no connection given: pass --connect or --profile")?;
        Ok(properties.clone())
    }

    /// Open a connection from [`Context::properties`].
    pub fn open(&self) -> Result<Connection> {
        let properties = self.properties()?;
        Connection::open(&properties).context("failed to open connection")
    }
}
