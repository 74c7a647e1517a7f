//! xmla - command-line client for XMLA endpoints.
//!
//! Runs MDX statements and Discover requests through the caching driver.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{discover, parse_connect, profiles, query};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// xmla - query XMLA endpoints with a response cache
#[derive(Parser)]
#[command(name = "xmla")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Connect string (jdbc:xmla:Server=...;Catalog=...)
    #[arg(short, long, global = true, env = "XMLA_CONNECT")]
    pub connect: Option<String>,

    /// Connection profile to use instead of a connect string
    #[arg(short, long, global = true, env = "XMLA_PROFILE")]
    pub profile: Option<String>,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an MDX statement and print the rowset
    Query(query::QueryArgs),

    /// Run a Discover request and print the rowset
    Discover(discover::DiscoverArgs),

    /// Show how a connect string is split into connection and cache properties
    ParseConnect(parse_connect::ParseConnectArgs),

    /// Manage saved connection profiles
    Profiles(profiles::ProfilesArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "xmla=debug,xmla_driver=debug,xmla_client=debug,xmla_cache=debug,xmla_config=debug,info"
    } else {
        "xmla=info,xmla_driver=info,xmla_client=warn,xmla_cache=warn,warn"
    };

    // Console logs go to stderr so stdout stays clean for --json.
    let (file_layer, _guard) = match &cli.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "xmla.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (Some(non_blocking), Some(guard))
        }
        None => (None, None),
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "xmla=trace,xmla_driver=trace,xmla_client=trace,xmla_cache=trace,xmla_config=trace,info",
                ))
        }))
        .init();

    let ctx = commands::Context {
        connect: cli.connect,
        profile: cli.profile,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Query(args) => query::run(args, &ctx).await,
        Commands::Discover(args) => discover::run(args, &ctx).await,
        Commands::ParseConnect(args) => parse_connect::run(args, &ctx).await,
        Commands::Profiles(args) => profiles::run(args, &ctx).await,
    }
}
