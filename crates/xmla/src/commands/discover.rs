//! Discover command - runs an XMLA Discover request.

use anyhow::{Result, anyhow};
use clap::Args;

use super::Context;
use crate::output::print_rowset;

/// Arguments for the discover command.
#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Request type (DISCOVER_DATASOURCES, MDSCHEMA_CUBES, ...)
    pub request_type: String,

    /// Restriction as KEY=VALUE (repeatable)
    #[arg(short, long = "restrict", value_parser = parse_restriction)]
    pub restrictions: Vec<(String, String)>,
}

/// Run the discover command.
pub async fn run(args: DiscoverArgs, ctx: &Context) -> Result<()> {
    let restrictions: Vec<(&str, &str)> = args
        .restrictions
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let conn = ctx.open()?;
    let mut cursor = conn.discover(&args.request_type, &restrictions).await?;
    print_rowset(&mut cursor, ctx.json_output)
}

fn parse_restriction(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("restriction name is empty"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_restriction() {
        assert_eq!(
            parse_restriction("CATALOG_NAME=FoodMart").unwrap(),
            ("CATALOG_NAME".to_string(), "FoodMart".to_string())
        );
        assert_eq!(parse_restriction("A=b=c").unwrap().1, "b=c");
        assert!(parse_restriction("novalue").is_err());
        assert!(parse_restriction("=x").is_err());
    }
}
