//! Parse-connect command - shows how a connect string is routed.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use xmla_config::{ConnectionSettings, PropertyMap, split_cache_properties};

use super::Context;

/// Arguments for the parse-connect command.
#[derive(Args, Debug)]
pub struct ParseConnectArgs {
    /// Connect string to inspect; defaults to --connect or the active profile
    pub connect_string: Option<String>,
}

#[derive(Debug, Serialize)]
struct ParseOutput {
    connection: PropertyMap,
    cache: PropertyMap,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the parse-connect command.
pub async fn run(args: ParseConnectArgs, ctx: &Context) -> Result<()> {
    let properties = match args.connect_string {
        Some(connect) => {
            if ctx.connect.is_some() {
                bail!("give the connect string either as an argument or with --connect");
            }
            Context {
                connect: Some(connect),
                profile: None,
                ..ctx.clone()
            }
            .properties()?
        }
        None => ctx.properties()?,
    };

    let split = split_cache_properties(&properties);
    let error = ConnectionSettings::from_properties(&split.connection)
        .err()
        .map(|e| e.to_string());

    if ctx.json_output {
        let output = ParseOutput {
            connection: split
                .connection
                .iter()
                .map(|(k, v)| (k.clone(), display_value(k, v).to_string()))
                .collect(),
            cache: split.cache,
            valid: error.is_none(),
            error,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let value = Style::new().cyan();

    println!();
    println!("{}", style("Connection properties").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    for (k, v) in &split.connection {
        println!("  {} {}", dim.apply_to(format!("{k}:")), value.apply_to(display_value(k, v)));
    }

    println!();
    println!("{}", style("Cache properties").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    if split.cache.is_empty() {
        println!("  {}", dim.apply_to("(none)"));
    }
    for (k, v) in &split.cache {
        println!("  {} {}", dim.apply_to(format!("{k}:")), value.apply_to(v));
    }

    println!();
    match error {
        None => println!("{}", Style::new().green().apply_to("✓ valid")),
        Some(e) => println!("{} {}", Style::new().red().apply_to("✗"), e),
    }
    Ok(())
}

fn display_value<'a>(key: &str, value: &'a str) -> &'a str {
    if key.eq_ignore_ascii_case("password") {
        "********"
    } else {
        value
    }
}
