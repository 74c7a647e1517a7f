//! Query command - runs an MDX statement.

use std::io::Read;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use tracing::debug;

use super::Context;
use crate::output::print_rowset;

/// Arguments for the query command.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// MDX statement; read from stdin when omitted or `-`
    pub statement: Option<String>,

    /// Run the statement this many times (repeats are answered by the cache)
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,
}

/// Run the query command.
pub async fn run(args: QueryArgs, ctx: &Context) -> Result<()> {
    let statement = match args.statement.as_deref() {
        Some(s) if s != "-" => s.to_string(),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read statement from stdin")?;
            buf
        }
    };
    let statement = statement.trim();
    if statement.is_empty() {
        bail!("empty MDX statement");
    }

    let conn = ctx.open()?;
    let mut cursor = conn.execute(statement).await?;
    for attempt in 2..=args.repeat {
        debug!(attempt, "Repeating statement");
        cursor = conn.execute(statement).await?;
    }

    print_rowset(&mut cursor, ctx.json_output)
}
